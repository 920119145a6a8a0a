// Communication channels lock-free
// Control side pushes scheduled sounds, the audio callback pops them

use crate::audio::click::ScheduledSound;
use ringbuf::{HeapRb, traits::Split};

pub type SoundProducer = ringbuf::HeapProd<ScheduledSound>;
pub type SoundConsumer = ringbuf::HeapCons<ScheduledSound>;

pub fn create_sound_channel(capacity: usize) -> (SoundProducer, SoundConsumer) {
    let rb = HeapRb::<ScheduledSound>::new(capacity);
    rb.split()
}
