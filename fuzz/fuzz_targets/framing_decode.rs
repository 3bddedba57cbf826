#![no_main]
use libfuzzer_sys::fuzz_target;
use core_framing as framing;

fuzz_target!(|data: &[u8]| {
    // Either a frame or a defined error; never a panic.
    if let Ok(f) = framing::Frame::decode(data) {
        assert_eq!(f.length as usize, f.payload.len());
        let w = f.encode().expect("decoded frame re-encodes");
        assert_eq!(&w[..], &data[..w.len()]);
    }
});
