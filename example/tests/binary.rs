use std::collections::BTreeMap;

use protoweave::{CodecError, Message, Writer, RECURSION_LIMIT};
use protoweave_example::defaults::google::protobuf::timestamp::Timestamp;
use protoweave_example::defaults::shop::widget::{Color, Widget, Widget_Part};
use protoweave_example::minimal;

fn widget() -> Widget {
    Widget {
        id: "w-1".to_string(),
        weight: -42,
        sizes: vec![1, 300, -2],
        stock: BTreeMap::from([("east".to_string(), 4), ("west".to_string(), 0)]),
        created: Some(Timestamp {
            seconds: 1_700_000_000,
            nanos:   5,
        }),
        note: Some("fragile".to_string()),
        count: Some(3),
        color: Color::ColorBlue as i32,
        parts: vec![Widget_Part {
            sku:   "frame".to_string(),
            child: Some(Box::new(Widget_Part {
                sku:   "bolt".to_string(),
                child: None,
            })),
        }],
        featured: Some(false),
        blob: vec![0, 255, 7],
        serial: u64::MAX,
        ratio: 0.5,
        quota: Some(0),
        display_name: "Widget".to_string(),
        ..Widget::default()
    }
}

/// A chain of `depth` parts, each holding the next as its child.
fn part_chain(depth: usize) -> Widget_Part {
    let mut part = Widget_Part::default();
    for _ in 1..depth {
        part = Widget_Part {
            sku:   String::new(),
            child: Some(Box::new(part)),
        };
    }
    part
}

#[test]
fn every_field_shape_round_trips() {
    let bytes = widget().encode_to_vec().unwrap();
    assert_eq!(Widget::decode_bytes(&bytes).unwrap(), widget());
}

#[test]
fn base_instance_encodes_to_nothing() {
    assert!(Widget::default().encode_to_vec().unwrap().is_empty());
    assert_eq!(Widget::decode_bytes(&[]).unwrap(), Widget::default());
}

#[test]
fn explicit_presence_survives_zero_values() {
    let widget = Widget {
        featured: Some(false),
        quota: Some(0),
        ..Widget::default()
    };
    let bytes = widget.encode_to_vec().unwrap();
    assert_eq!(bytes, [88, 0, 122, 0]);
    assert_eq!(Widget::decode_bytes(&bytes).unwrap(), widget);
}

#[test]
fn repeated_scalars_are_written_packed_and_read_either_way() {
    let widget = Widget {
        sizes: vec![1, 2, 3],
        ..Widget::default()
    };
    assert_eq!(widget.encode_to_vec().unwrap(), [26, 3, 1, 2, 3]);

    let packed = [26, 3, 1, 2, 3];
    let unpacked = [24, 1, 24, 2, 24, 3];
    let mixed = [24, 1, 26, 2, 2, 3];
    for bytes in [&packed[..], &unpacked[..], &mixed[..]] {
        assert_eq!(Widget::decode_bytes(bytes).unwrap().sizes, vec![1, 2, 3]);
    }
}

#[test]
fn map_entries_merge_by_key() {
    let mut writer = Writer::new();
    for (key, value) in [("a", 1), ("b", 2), ("a", 3)] {
        writer.uint32(34).fork();
        writer.uint32(10).string(key).uint32(16).int32(value);
        writer.ldelim();
    }
    writer.uint32(34).fork();
    writer.uint32(10).string("c");
    writer.ldelim();

    let widget = Widget::decode_bytes(&writer.finish()).unwrap();
    assert_eq!(
        widget.stock,
        BTreeMap::from([("a".to_string(), 3), ("b".to_string(), 2), ("c".to_string(), 0)])
    );
}

#[test]
fn later_oneof_member_clears_the_earlier_one() {
    let mut writer = Writer::new();
    writer.uint32(58).string("first");
    writer.uint32(64).int32(7);
    let widget = Widget::decode_bytes(&writer.finish()).unwrap();
    assert_eq!((widget.name, widget.count), (None, Some(7)));

    let mut writer = Writer::new();
    writer.uint32(64).int32(7);
    writer.uint32(58).string("second");
    let widget = Widget::decode_bytes(&writer.finish()).unwrap();
    assert_eq!((widget.name, widget.count), (Some("second".to_string()), None));
}

#[test]
fn unknown_fields_and_groups_are_skipped() {
    let mut writer = Writer::new();
    writer.uint32(10).string("kept");
    writer.uint32(99 << 3 | 2).string("ignored");
    writer.uint32(100 << 3 | 3).uint32(8).uint32(1);
    writer.uint32(100 << 3 | 4);
    writer.uint32(101 << 3 | 5).fixed32(4);
    writer.uint32(64).int32(2);

    let widget = Widget::decode_bytes(&writer.finish()).unwrap();
    assert_eq!(widget.id, "kept");
    assert_eq!(widget.count, Some(2));
}

#[test]
fn malformed_groups_fail() {
    assert_eq!(
        Widget::decode_bytes(&[0x9b, 0x06, 0xa4, 0x06]),
        Err(CodecError::GroupMismatch {
            expected: 99,
            found:    100,
        })
    );
    assert_eq!(
        Widget::decode_bytes(&[0x9b, 0x06].repeat(200_000)),
        Err(CodecError::RecursionLimit(RECURSION_LIMIT))
    );
}

#[test]
fn nested_messages_stop_at_the_recursion_limit() {
    let shallow = Widget {
        parts: vec![part_chain(50)],
        ..Widget::default()
    };
    let bytes = shallow.encode_to_vec().unwrap();
    assert_eq!(Widget::decode_bytes(&bytes).unwrap(), shallow);

    let deep = Widget {
        parts: vec![part_chain(RECURSION_LIMIT + 50)],
        ..Widget::default()
    };
    let bytes = deep.encode_to_vec().unwrap();
    assert_eq!(Widget::decode_bytes(&bytes), Err(CodecError::RecursionLimit(RECURSION_LIMIT)));
}

#[test]
fn truncated_input_fails() {
    let bytes = widget().encode_to_vec().unwrap();
    assert!(Widget::decode_bytes(&bytes[..bytes.len() - 1]).is_err());
}

#[test]
fn binary_only_output_shares_the_wire_format() {
    let bytes = widget().encode_to_vec().unwrap();
    let minimal = minimal::shop::widget::Widget::decode_bytes(&bytes).unwrap();
    assert_eq!(minimal.id, "w-1");
    assert_eq!(minimal.serial, u64::MAX);
    assert_eq!(minimal.created.as_ref().map(|t| t.seconds), Some(1_700_000_000));
    assert_eq!(minimal.parts[0].child.as_ref().unwrap().sku, "bolt");

    assert_eq!(minimal.encode_to_vec().unwrap(), bytes);
}
