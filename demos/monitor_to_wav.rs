// demos/monitor_to_wav.rs
use acqring::harness::{spawn_acquisition, SyntheticStream};
use acqring::{reunite, BufferConfig, ColumnMetadata, DataBuffer, SampleBlock};
use std::time::Duration;

fn main() {
    env_logger::init();

    // Two channels at 30 kHz, drained in 512-sample quanta.
    let config = BufferConfig::new(2, 8192).with_block_size(512);
    let buffer = DataBuffer::from_config(&config).unwrap();
    let (writer, mut reader) = buffer.split();
    let monitor = reader.monitor();

    let handle = spawn_acquisition(
        writer,
        SyntheticStream::new(2, 30_000.0),
        300,
        100,
        Duration::from_millis(1),
    );

    let spec = hound::WavSpec {
        channels: 2,
        sample_rate: 30_000,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut wav = hound::WavWriter::create("monitor.wav", spec).unwrap();
    let mut block: SampleBlock = config.make_block();
    let mut meta: ColumnMetadata = config.make_metadata();
    let mut drain = |reader: &mut acqring::BufferReader, wav: &mut hound::WavWriter<_>| {
        let result = reader.read_all_from_buffer(&mut block, &mut meta, config.block_size);
        for i in 0..result.num_samples {
            // Synthetic values run into the thousands; scale into [-1, 1).
            wav.write_sample(block.channel(0)[i] / 65_536.0).unwrap();
            wav.write_sample(block.channel(1)[i] / 65_536.0).unwrap();
        }
        result.num_samples
    };

    while !handle.is_finished() {
        if drain(&mut reader, &mut wav) == 0 {
            std::thread::sleep(Duration::from_millis(2));
        }
    }
    let writer = handle.join().unwrap();
    while drain(&mut reader, &mut wav) > 0 {}
    wav.finalize().unwrap();

    let metrics = monitor.metrics();
    println!(
        "Wrote monitor.wav: {} columns read, {} dropped, peak backlog {}",
        metrics.total_read, metrics.dropped, metrics.peak_available
    );

    let mut buffer = reunite(writer, reader).unwrap();
    buffer.clear();
}
