//! Fuzz target: `decode_frame` + `MovingAverage`
//!
//! Splits arbitrary bytes into 4-byte converter frames and decodes them in
//! sequence, the way successive acquisitions do.  A faulted frame must
//! carry its sentinel and the previous cold junction; the average must
//! stay inside the window it was computed from.
//!
//! cargo fuzz run fuzz_frame_decoder

#![no_main]

use libfuzzer_sys::fuzz_target;
use reflow::sensors::thermocouple::{decode_frame, MovingAverage};

fuzz_target!(|data: &[u8]| {
    let mut cold = 0i16;
    let mut average = MovingAverage::new(100);

    for chunk in data.chunks_exact(4) {
        let frame = [chunk[0], chunk[1], chunk[2], chunk[3]];
        let sample = decode_frame(frame, cold);

        if let Some(fault) = sample.fault {
            assert_eq!(sample.hot, fault.sentinel());
            assert_eq!(sample.cold, cold, "faulted frame must keep the cold junction");
        }
        cold = sample.cold;

        average.push(sample.hot);
        let window = average.window();
        let min = *window.iter().min().unwrap();
        let max = *window.iter().max().unwrap();
        assert!((min..=max).contains(&average.average()));
    }
});
