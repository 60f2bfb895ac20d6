// demos/live_source.rs
use acqring::harness::{spawn_acquisition, SyntheticStream};
use acqring::{reunite, DataBuffer, SampleBlock, SourceNode, TtlEvent};
use std::time::Duration;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let (writer_a, reader_a) = DataBuffer::new(4, 4096).unwrap().split();
    let (writer_b, reader_b) = DataBuffer::new(2, 4096).unwrap().split();

    let mut node = SourceNode::new(256);
    let a = node.add_stream(reader_a, 4, 1);
    let b = node.add_stream(reader_b, 2, 0);

    let acq_a = spawn_acquisition(
        writer_a,
        SyntheticStream::new(4, 30_000.0).with_ttl_period(1500),
        150,
        200,
        Duration::from_millis(5),
    );
    let acq_b = spawn_acquisition(
        writer_b,
        SyntheticStream::new(2, 2_500.0),
        13,
        200,
        Duration::from_millis(5),
    );

    let mut block = SampleBlock::new(node.total_channels(), node.block_size());
    let mut events: Vec<TtlEvent> = Vec::with_capacity(256);
    while !(acq_a.is_finished() && acq_b.is_finished()) {
        events.clear();
        node.process(&mut block, &mut events);
        for event in &events {
            println!(
                "TTL line {} -> {} at sample {}",
                event.line, event.state, event.sample_number
            );
        }
        std::thread::sleep(Duration::from_millis(8));
    }

    println!("TTL events lost to a full event list: {}", node.dropped_events());
    for id in [a, b] {
        if let Some(info) = node.stream_info(id) {
            println!(
                "stream {}: last block starts at sample {} ({:.4} s)",
                id.0, info.first_sample_number, info.first_timestamp
            );
        }
    }

    let writers = [acq_a.join().unwrap(), acq_b.join().unwrap()];
    for (writer, reader) in writers.into_iter().zip(node.into_readers()) {
        println!("dropped: {}", writer.dropped_samples());
        let mut buffer = reunite(writer, reader).unwrap();
        buffer.clear();
    }
}
