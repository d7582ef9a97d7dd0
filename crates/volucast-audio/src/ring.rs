use ringbuf::traits::{Consumer, Observer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};

use crate::SAMPLES_PER_FRAME;

pub type PcmProducer = HeapProd<f32>;
pub type PcmConsumer = HeapCons<f32>;

/// Lock-free ring buffer between the capture callback and the audio
/// packet sender. `capacity_frames` is measured in Opus frames.
pub fn pcm_ring(capacity_frames: usize) -> (PcmProducer, PcmConsumer) {
    HeapRb::<f32>::new(capacity_frames * SAMPLES_PER_FRAME).split()
}

/// Pop exactly one Opus frame's worth of samples, if available.
pub fn read_frame(consumer: &mut PcmConsumer, frame: &mut [f32; SAMPLES_PER_FRAME]) -> bool {
    if consumer.occupied_len() < SAMPLES_PER_FRAME {
        return false;
    }
    let read = consumer.pop_slice(frame);
    debug_assert_eq!(read, SAMPLES_PER_FRAME);
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use ringbuf::traits::Producer;

    #[test]
    fn frame_only_pops_when_full() {
        let (mut producer, mut consumer) = pcm_ring(4);
        let mut frame = [0.0f32; SAMPLES_PER_FRAME];

        producer.push_slice(&vec![0.5; SAMPLES_PER_FRAME - 1]);
        assert!(!read_frame(&mut consumer, &mut frame));

        producer.push_slice(&[0.5]);
        assert!(read_frame(&mut consumer, &mut frame));
        assert_eq!(frame[0], 0.5);
        assert!(!read_frame(&mut consumer, &mut frame));
    }

    #[test]
    fn overflow_drops_newest_samples() {
        let (mut producer, mut consumer) = pcm_ring(1);
        let pushed = producer.push_slice(&vec![1.0; SAMPLES_PER_FRAME * 2]);
        assert_eq!(pushed, SAMPLES_PER_FRAME);

        let mut frame = [0.0f32; SAMPLES_PER_FRAME];
        assert!(read_frame(&mut consumer, &mut frame));
    }
}
