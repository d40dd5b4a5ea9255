#![no_main]

use libfuzzer_sys::fuzz_target;
use quiz_sync_client::ClientMessage;

fuzz_target!(|data: &[u8]| {
    // Anything that parses as a command must serialize back without error.
    if let Ok(message) = serde_json::from_slice::<ClientMessage>(data) {
        let _ = serde_json::to_string(&message);
    }
});
