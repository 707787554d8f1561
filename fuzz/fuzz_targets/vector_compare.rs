#![no_main]

use libfuzzer_sys::fuzz_target;
use peersync_core::Vector;

fuzz_target!(|data: &[u8]| {
    let Ok((left, right)) = serde_json::from_slice::<(Vector, Vector)>(data) else {
        return;
    };

    let ord = left.compare(&right);
    assert_eq!(right.compare(&left), ord.reverse());

    let merged = left.copy().merge(&right);
    assert!(merged.greater_equal(&left));
    assert!(merged.greater_equal(&right));
    assert!(merged.counters().windows(2).all(|w| w[0].id < w[1].id));
});
