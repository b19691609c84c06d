use heapdb::tuple::{DataType, Schema, TupleBuilder};
use heapdb::{Database, StorageConfig};

fn main() {
    println!("heapdb - transactional heap storage in Rust");
    println!("===========================================\n");

    let dir = std::env::temp_dir().join("heapdb-demo");
    std::fs::create_dir_all(&dir).expect("Failed to create demo directory");
    let data_path = dir.join("users.dat");
    std::fs::remove_file(&data_path).ok();

    // Small pool so the demo shows eviction
    let config = StorageConfig::new().with_pool_capacity(2);
    let db = Database::new(config).expect("Failed to open database");
    println!(
        "Opened database: page size {} bytes, pool of {} pages\n",
        db.config().page_size,
        db.config().pool_capacity
    );

    let schema = Schema::builder()
        .column("id", DataType::Integer)
        .column("name", DataType::Text(32))
        .build_arc()
        .expect("Invalid schema");
    let table_id = db
        .create_table("users", schema.clone(), &data_path)
        .expect("Failed to create table");
    println!("Created table users ({}) as {}", schema, table_id);

    // Insert some tuples
    let txn = db.begin();
    for (id, name) in [(1, "alice"), (2, "bob"), (3, "carol")] {
        let mut tuple = TupleBuilder::new(schema.clone())
            .value(id)
            .value(name)
            .build()
            .expect("Failed to build tuple");
        db.buffer_pool()
            .insert_tuple(txn.id(), table_id, &mut tuple)
            .expect("Failed to insert tuple");
        println!("Inserted {} at {:?}", tuple, tuple.record_id());
    }
    txn.commit().expect("Failed to commit");
    println!("\nCommitted");

    // An aborted insert leaves no trace
    let txn = db.begin();
    let mut ghost = TupleBuilder::new(schema.clone())
        .value(4)
        .value("mallory")
        .build()
        .expect("Failed to build tuple");
    db.buffer_pool()
        .insert_tuple(txn.id(), table_id, &mut ghost)
        .expect("Failed to insert tuple");
    txn.abort().expect("Failed to abort");
    println!("Inserted and aborted {}", ghost);

    // Read the data back
    let txn = db.begin();
    println!("\nScanning users:");
    for tuple in db
        .buffer_pool()
        .scan(txn.id(), table_id)
        .expect("Failed to open scan")
    {
        println!("  - {}", tuple.expect("Failed to read tuple"));
    }
    txn.commit().expect("Failed to commit");

    let heap_file = db.catalog().heap_file(table_id).expect("Table not found");
    println!(
        "\nTable file has {} page(s), {} reads, {} writes",
        heap_file.num_pages().expect("Failed to stat file"),
        heap_file.store().num_reads(),
        heap_file.store().num_writes()
    );

    // Clean up
    std::fs::remove_dir_all(&dir).ok();
    println!("\nDemo completed successfully!");
}
