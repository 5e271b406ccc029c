use shared::domain::TileIndex;
use storage::Storage;

// Tasks interleave between the existence check and the write, so several may
// see the same state. The idempotent insert/delete must absorb that.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_toggles_on_one_tile_never_error() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let board_id = storage.create_board().await.expect("board");
    let tile = TileIndex::try_from(7).expect("tile");

    let mut handles = Vec::new();
    for _ in 0..16 {
        let storage = storage.clone();
        handles.push(tokio::spawn(async move {
            storage.toggle_tile(board_id, tile).await
        }));
    }
    for handle in handles {
        handle.await.expect("join").expect("toggle succeeds");
    }

    let active = storage.list_active_tiles(board_id).await.expect("active");
    assert!(active.len() <= 1);
    assert_eq!(
        active.contains(&tile),
        storage.is_tile_active(board_id, tile).await.expect("state")
    );
}
