#![no_main]

use libfuzzer_sys::fuzz_target;
use peersync_core::{HEADER_LEN, Header};

fuzz_target!(|data: &[u8]| {
    match Header::unmarshal(data) {
        Ok(header) => {
            assert_eq!(data.len(), HEADER_LEN);
            // Reserved bits are dropped, so re-encoding is stable from here on.
            let encoded = header.marshal();
            assert_eq!(Header::unmarshal(&encoded), Ok(header));
            let _ = header.message_type();
        }
        Err(_) => assert_ne!(data.len(), HEADER_LEN),
    }
});
