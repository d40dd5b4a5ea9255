#![no_main]

use libfuzzer_sys::fuzz_target;
use quiz_sync_client::dispatcher::{dispatch, try_decode};
use quiz_sync_client::view::{AdminView, ScreenView, TableView};

fuzz_target!(|data: &[u8]| {
    let Ok(raw) = std::str::from_utf8(data) else {
        let _ = serde_json::from_slice::<quiz_sync_client::ServerMessage>(data);
        return;
    };

    let _ = try_decode(raw);

    // Every role must survive arbitrary input without panicking.
    let mut table = TableView::default();
    let _ = dispatch(&mut table, raw);
    let _ = table.panel();

    let mut screen = ScreenView::default();
    let _ = dispatch(&mut screen, raw);
    let _ = screen.lobby();
    let _ = screen.leaderboard();

    let mut admin = AdminView;
    let _ = dispatch(&mut admin, raw);
});
