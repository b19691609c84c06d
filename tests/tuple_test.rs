use std::sync::Arc;

use heapdb::common::{PageId, SlotId, TableId, DEFAULT_STRING_LEN};
use heapdb::storage::page::HeapPage;
use heapdb::tuple::{DataType, Schema, Tuple, TupleBuilder, Value};

fn create_user_schema() -> Arc<Schema> {
    Schema::builder()
        .column("id", DataType::Integer)
        .column("name", DataType::Text(20))
        .column("age", DataType::Integer)
        .build_arc()
        .unwrap()
}

fn user(schema: &Arc<Schema>, id: i32, name: &str, age: i32) -> Tuple {
    TupleBuilder::new(schema.clone())
        .value(id)
        .value(name)
        .value(age)
        .build()
        .unwrap()
}

#[test]
fn test_record_layout() {
    let schema = create_user_schema();
    assert_eq!(schema.record_width(), 4 + (4 + 20) + 4);

    let bytes = user(&schema, 258, "Al", -1).to_bytes();
    assert_eq!(bytes.len(), schema.record_width());

    // Big-endian integer
    assert_eq!(&bytes[0..4], &[0, 0, 1, 2]);
    // Length prefix, then the text zero-padded to its maximum length
    assert_eq!(&bytes[4..8], &[0, 0, 0, 2]);
    assert_eq!(&bytes[8..10], b"Al");
    assert!(bytes[10..28].iter().all(|&b| b == 0));
    assert_eq!(&bytes[28..32], &[0xFF, 0xFF, 0xFF, 0xFF]);
}

#[test]
fn test_tuple_through_heap_page() {
    let schema = create_user_schema();
    let page_id = PageId::new(TableId(7), 3);
    let mut page = HeapPage::new(page_id, HeapPage::empty_page_data(4096), schema.clone()).unwrap();

    let mut original = user(&schema, 1, "Alice", 30);
    let slot = page.insert_tuple(&mut original).unwrap();

    // Reopen the same bytes as a fresh page
    let reopened = HeapPage::new(page_id, page.data().to_vec(), schema.clone()).unwrap();
    let recovered = reopened.tuple(slot).unwrap();

    assert_eq!(original, recovered);
    assert_eq!(recovered.record_id(), original.record_id());
    assert_eq!(recovered.value_by_name("name"), Some(&Value::from("Alice")));
    assert_eq!(recovered.value_by_name("age"), Some(&Value::Integer(30)));
}

#[test]
fn test_many_tuples_in_page() {
    let schema = create_user_schema();
    let mut page = HeapPage::new(
        PageId::new(TableId(1), 0),
        HeapPage::empty_page_data(4096),
        schema.clone(),
    )
    .unwrap();

    // 4096 * 8 / (32 * 8 + 1) = 127 slots
    assert_eq!(page.num_slots(), 127);
    for i in 0..127 {
        let mut tuple = user(&schema, i, &format!("user{}", i), 20 + i % 50);
        assert_eq!(page.insert_tuple(&mut tuple).unwrap(), SlotId::new(i as u16));
    }
    assert_eq!(page.free_slot_count(), 0);

    let ids: Vec<i32> = page
        .iter()
        .map(|t| t.unwrap().value(0).unwrap().as_integer().unwrap())
        .collect();
    assert_eq!(ids, (0..127).collect::<Vec<_>>());
}

#[test]
fn test_text_limits() {
    let schema = create_user_schema();

    let exact = "x".repeat(20);
    assert!(TupleBuilder::new(schema.clone())
        .value(1)
        .value(exact.as_str())
        .value(1)
        .build()
        .is_ok());

    let too_long = "x".repeat(21);
    assert!(TupleBuilder::new(schema.clone())
        .value(1)
        .value(too_long.as_str())
        .value(1)
        .build()
        .is_err());

    // Multi-byte characters count in bytes
    assert!(TupleBuilder::new(schema)
        .value(1)
        .value("é".repeat(11).as_str())
        .value(1)
        .build()
        .is_err());
}

#[test]
fn test_catalog_string_type() {
    let data_type = DataType::from_catalog_name("string").unwrap();
    assert_eq!(data_type, DataType::Text(DEFAULT_STRING_LEN));
    assert_eq!(data_type.width(), 4 + DEFAULT_STRING_LEN as usize);
    assert_eq!(DataType::Integer.width(), 4);
}

#[test]
fn test_value_comparisons() {
    assert!(Value::Integer(1) < Value::Integer(2));
    assert!(Value::from("apple") < Value::from("banana"));
    assert_eq!(Value::from(5).as_integer(), Some(5));
    assert_eq!(Value::from("x").as_text(), Some("x"));
    assert_eq!(Value::from(5).as_text(), None);
}
