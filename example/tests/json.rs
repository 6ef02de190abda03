use std::collections::BTreeMap;

use protoweave::{CodecError, FromPartial, JsonMessage};
use protoweave_example::defaults::google::protobuf::timestamp::{Timestamp, TimestampPartial};
use protoweave_example::defaults::shop::widget::{Color, Widget, WidgetPartial, Widget_Part, Widget_PartPartial};
use serde_json::json;

fn widget() -> Widget {
    Widget {
        id: "w-1".to_string(),
        weight: -42,
        sizes: vec![1, 300, -2],
        stock: BTreeMap::from([("east".to_string(), 4)]),
        created: Some(Timestamp {
            seconds: 1_700_000_000,
            nanos:   5,
        }),
        note: Some("fragile".to_string()),
        name: Some("anvil".to_string()),
        color: Color::ColorRed as i32,
        parts: vec![Widget_Part {
            sku:   "frame".to_string(),
            child: Some(Box::new(Widget_Part {
                sku:   "bolt".to_string(),
                child: None,
            })),
        }],
        featured: Some(true),
        blob: b"hi!".to_vec(),
        serial: u64::MAX,
        ratio: 0.25,
        quota: Some(9),
        display_name: "Widget".to_string(),
        ..Widget::default()
    }
}

#[test]
fn json_round_trip() {
    let value = widget().to_json();
    assert_eq!(Widget::from_json(&value).unwrap(), widget());
    assert_eq!(Widget::from_json_str(&widget().to_json_string()).unwrap(), widget());
}

#[test]
fn well_known_types_use_their_json_forms() {
    let value = widget().to_json();
    assert_eq!(value["created"], json!("2023-11-14T22:13:20.000000005Z"));
    assert_eq!(value["note"], json!("fragile"));
    assert_eq!(value["quota"], json!(9));
    assert_eq!(value["blob"], json!("aGkh"));
    assert_eq!(value["color"], json!("COLOR_RED"));
    assert_eq!(value["displayName"], json!("Widget"));
    assert_eq!(value["stock"], json!({ "east": 4 }));
    assert!(value.get("count").is_none());

    let parsed = Widget::from_json(&json!({ "created": { "seconds": "10", "nanos": 2 } })).unwrap();
    assert_eq!(parsed.created, Some(Timestamp { seconds: 10, nanos: 2 }));
}

#[test]
fn later_oneof_member_clears_the_earlier_one() {
    let parsed = Widget::from_json(&json!({ "name": "a", "count": "5" })).unwrap();
    assert_eq!((parsed.name, parsed.count), (None, Some(5)));

    let parsed = Widget::from_json(&json!({ "name": "a", "count": null })).unwrap();
    assert_eq!((parsed.name, parsed.count), (Some("a".to_string()), None));
}

#[test]
fn sixty_four_bit_fields_accept_strings_and_check_range() {
    let parsed = Widget::from_json(&json!({ "weight": "-7", "serial": "18446744073709551615" })).unwrap();
    assert_eq!(parsed.weight, -7);
    assert_eq!(parsed.serial, u64::MAX);

    assert_eq!(
        Widget::from_json(&json!({ "serial": "-1" })),
        Err(CodecError::Overflow("-1".to_string()))
    );
    assert_eq!(
        Widget::from_json(&json!({ "weight": "12ab" })),
        Err(CodecError::InvalidLong("12ab".to_string()))
    );
}

#[test]
fn enums_read_names_and_numbers() {
    assert_eq!(Widget::from_json(&json!({ "color": "COLOR_BLUE" })).unwrap().color, 2);
    assert_eq!(Widget::from_json(&json!({ "color": 1 })).unwrap().color, 1);
    assert!(matches!(
        Widget::from_json(&json!({ "color": "MAUVE" })),
        Err(CodecError::InvalidEnumValue { enum_name: "Color", .. })
    ));

    let unknown = Widget {
        color: 7,
        ..Widget::default()
    };
    assert_eq!(unknown.to_json()["color"], json!(7));
}

#[test]
fn non_objects_are_rejected() {
    assert!(matches!(
        Widget::from_json(&json!([1, 2])),
        Err(CodecError::UnexpectedJson { .. })
    ));
    assert!(matches!(Widget::from_json_str("{"), Err(CodecError::InvalidJson(_))));
}

#[test]
fn partials_fill_in_defaults_recursively() {
    let widget = Widget::from_partial(WidgetPartial {
        id: Some("p".to_string()),
        created: Some(TimestampPartial {
            seconds: Some(10),
            ..Default::default()
        }),
        parts: Some(vec![Widget_PartPartial {
            child: Some(Box::new(Widget_PartPartial {
                sku: Some("leaf".to_string()),
                ..Default::default()
            })),
            ..Default::default()
        }]),
        ..Default::default()
    });

    assert_eq!(widget.id, "p");
    assert_eq!(widget.weight, 0);
    assert_eq!(widget.created, Some(Timestamp { seconds: 10, nanos: 0 }));
    assert_eq!(widget.parts[0].sku, "");
    assert_eq!(widget.parts[0].child.as_ref().unwrap().sku, "leaf");
    assert_eq!(Widget::from_partial(WidgetPartial::default()), Widget::default());
}
