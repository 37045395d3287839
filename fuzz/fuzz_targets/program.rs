#![no_main]

use libfuzzer_sys::fuzz_target;
use spvgroup::{TransformConfig, Transformer};

fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data) {
        let _ = Transformer::new(TransformConfig::default().with_parallel_detection(false))
            .transform_str(text);
    }
});
