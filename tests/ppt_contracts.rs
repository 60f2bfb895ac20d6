//! Lifecycle operations must leave their invariants in the contract log.

use acqring::invariant_ppt::{
    contract_test, BUFFER_DIMENSIONS_VALID, CLEAR_RESETS_CURSORS, CONFIG_VALIDATED,
    RESIZE_INVALIDATES_DATA, REUNITE_SAME_BUFFER, SPLIT_SHARES_STORAGE, STREAM_CHANNELS_BOUNDED,
    TTL_LINES_BOUNDED,
};
use acqring::{reunite, BufferConfig, BufferError, DataBuffer, SourceNode};

#[test]
fn session_lifecycle_contract() {
    let config = BufferConfig::new(4, 128).with_block_size(32);
    let mut buffer = DataBuffer::from_config(&config).unwrap();
    buffer.resize(2, 64).unwrap();
    buffer.clear();

    let (writer, reader) = buffer.split();
    let mut node = SourceNode::new(config.block_size);
    node.add_stream(reader, 2, 8);
    let reader = node.into_readers().pop().unwrap();
    let _buffer = reunite(writer, reader).unwrap();

    contract_test(
        "session lifecycle",
        &[
            CONFIG_VALIDATED,
            BUFFER_DIMENSIONS_VALID,
            RESIZE_INVALIDATES_DATA,
            CLEAR_RESETS_CURSORS,
            SPLIT_SHARES_STORAGE,
            STREAM_CHANNELS_BOUNDED,
            TTL_LINES_BOUNDED,
            REUNITE_SAME_BUFFER,
        ],
    );
}

#[test]
fn invalid_config_fails_setup() {
    let config = BufferConfig::new(0, 128);
    assert_eq!(
        DataBuffer::from_config(&config).unwrap_err(),
        BufferError::InvalidConfiguration {
            num_channels: 0,
            num_samples: 128
        }
    );
    let config = BufferConfig::new(2, 16).with_block_size(32);
    assert!(matches!(
        DataBuffer::from_config(&config),
        Err(BufferError::BlockLargerThanCapacity { .. })
    ));
    assert_eq!(
        BufferError::InvalidConfiguration {
            num_channels: 0,
            num_samples: 128
        }
        .to_string(),
        "invalid buffer configuration: 0 channels x 128 samples"
    );
}
