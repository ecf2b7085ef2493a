use rowstore::{BPlusTreeConfig, Column, DataType, Predicate, Schema, TableIndex, Value};
use tracing_subscriber::EnvFilter;

fn main() -> rowstore::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let schema = Schema::new("demo");
    let users = schema.create_table(
        "users",
        vec![
            Column::not_null("id", DataType::Int),
            Column::nullable("email", DataType::Text),
            Column::not_null("age", DataType::Int),
            Column::not_null("active", DataType::Bool),
        ],
    )?;

    let by_age = users.create_index("age", "idx_age")?;
    let by_id = users.create_composite_index("ux_id", &["id"], true)?;
    let active_emails = users.create_partial_index(
        "ux_active_email",
        &["email"],
        true,
        Predicate::equals("active", Value::Bool(true)),
    )?;
    let age_tree = users.create_bplus_tree_index("age", "bt_age", BPlusTreeConfig::with_order(4))?;

    for i in 0..20i64 {
        users.insert(vec![
            Value::Int(i),
            Value::from(format!("user{}@example.com", i % 15).as_str()),
            Value::Int(20 + i % 7),
            Value::Bool(i < 15),
        ])?;
    }

    let duplicate = users.insert(vec![
        Value::Int(3),
        Value::from("fresh@example.com"),
        Value::Int(30),
        Value::Bool(true),
    ]);
    if let Err(err) = duplicate {
        println!("rejected duplicate id: {err}");
    }

    let in_range = by_age.find_range(&Value::Int(22), &Value::Int(24));
    println!("ages 22..=24: {} rows", in_range.len());
    assert_eq!(in_range, age_tree.find_range(&Value::Int(22), &Value::Int(24)));

    for row in users.rows_by_ids(&by_id.find_exact(&[Value::Int(7)])) {
        println!("id 7 -> {:?}", row.values());
    }
    println!(
        "active emails: {} keys, tree height {}, {} bytes of row data",
        active_emails.key_count(),
        age_tree.height(),
        users.memory_usage()
    );
    Ok(())
}
