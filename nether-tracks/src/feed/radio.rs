//! Radio chatter effect for 8-bit unsigned audio
//!
//! Subtracts a running 4-sample average from every sample and doubles the
//! difference, which thins the sound out like a handheld radio. The last
//! four output bytes are forced to silence.

const SILENCE: u8 = 0x80;
const WINDOW: usize = 4;

/// Apply the radio chatter filter in place
pub fn apply_radio_chatter(buf: &mut [u8]) {
    if buf.len() <= WINDOW {
        buf.fill(SILENCE);
        return;
    }

    let input = buf.to_vec();
    let centred = |b: u8| i32::from(b) - 0x80;
    let mut value: i32 = input[..WINDOW].iter().map(|&b| centred(b)).sum();

    for i in 0..input.len() - WINDOW {
        let t = i32::from(input[i]);
        let v = t - value / 4;
        value = centred(input[i + WINDOW]) + (value - t + 0x80);
        buf[i] = (v * 2 + 0x80) as u8;
    }

    let len = buf.len();
    buf[len - WINDOW..].fill(SILENCE);
}
