mod common;

use common::{load_fixture, load_text as load};
use csv_blend::{
    append::append_tables,
    error::MergeError,
    merge::{CollisionPolicy, JoinKind, MergeSource, MergeSpec, MergeWarning, merge_tables},
    schema::ColumnType,
    table::Table,
};

fn outer<'a>(sources: &[(&'a str, &'a Table, &'a str)]) -> MergeSpec<'a> {
    MergeSpec {
        sources: sources
            .iter()
            .map(|&(name, table, key)| MergeSource { name, table, key })
            .collect(),
        kind: JoinKind::Outer,
        collisions: CollisionPolicy::KeepFirst,
    }
}

#[test]
fn outer_join_keeps_every_key() {
    let a = load("id,x\n1,a\n2,b\n3,c\n");
    let b = load("id,y\n2,B\n3,C\n4,D\n");
    let outcome = merge_tables(&outer(&[("a", &a, "id"), ("b", &b, "id")])).unwrap();
    let table = outcome.table;

    assert_eq!(table.headers(), vec!["id", "x", "y"]);
    let keys: Vec<_> = table.column_values(0).collect();
    assert_eq!(keys, vec!["1", "2", "3", "4"]);
    assert_eq!(table.cell(0, 2), None, "key 1 has no y");
    assert_eq!(table.cell(3, 1), None, "key 4 has no x");
    assert_eq!(table.cell(1, 2), Some("B"));
    assert_eq!(table.columns()[0].kind, ColumnType::Numeric);
}

#[test]
fn colliding_columns_keep_the_first_source() {
    let a = load("id,name\n1,alpha\n");
    let b = load("id,name\n1,beta\n");
    let table = merge_tables(&outer(&[("a", &a, "id"), ("b", &b, "id")]))
        .unwrap()
        .table;
    assert_eq!(table.headers(), vec!["id", "name"]);
    assert_eq!(table.cell(0, 1), Some("alpha"));
}

#[test]
fn right_only_rows_leave_kept_first_columns_null() {
    let a = load("id,name\n1,alpha\n2,beta\n3,gamma\n");
    let b = load("id,name\n2,B2\n3,B3\n4,B4\n");
    let table = merge_tables(&outer(&[("a", &a, "id"), ("b", &b, "id")]))
        .unwrap()
        .table;
    assert_eq!(table.headers(), vec!["id", "name"]);
    let names: Vec<_> = table.column_cells(1).collect();
    assert_eq!(
        names,
        vec![Some("alpha"), Some("beta"), Some("gamma"), None]
    );
    assert_eq!(table.cell(3, 0), Some("4"));
}

#[test]
fn source_without_key_is_skipped_with_warning() {
    let a = load("id,x\n1,a\n");
    let b = load("id,y\n1,b\n");
    let c = load("other,z\n1,c\n");
    let outcome =
        merge_tables(&outer(&[("a", &a, "id"), ("b", &b, "id"), ("c", &c, "id")])).unwrap();
    assert_eq!(
        outcome.warnings,
        vec![MergeWarning::MissingKey {
            source_name: "c".into(),
            key: "id".into()
        }]
    );
    assert_eq!(outcome.table.headers(), vec!["id", "x", "y"]);
}

#[test]
fn fewer_than_two_valid_sources_fail() {
    let a = load("id,x\n1,a\n");
    let b = load("other,y\n1,b\n");
    let err = merge_tables(&outer(&[("a", &a, "id"), ("b", &b, "id")])).unwrap_err();
    assert!(matches!(
        err,
        MergeError::InsufficientSources {
            valid: 1,
            required: 2
        }
    ));

    let err = merge_tables(&outer(&[("a", &a, "id")])).unwrap_err();
    assert!(matches!(err, MergeError::InsufficientSources { valid: 1, .. }));
}

#[test]
fn differently_named_keys_join_under_combined_name() {
    let orders = load_fixture("orders.csv");
    let customers = load_fixture("customers.csv");
    let vip = load_fixture("vip.csv");
    let outcome = merge_tables(&outer(&[
        ("orders", &orders, "customer_id"),
        ("customers", &customers, "customer_id"),
        ("vip", &vip, "id"),
    ]))
    .unwrap();
    let table = outcome.table;

    assert_eq!(table.headers()[1], "customer_id/id");
    assert!(table.column_index("tier").is_some());
    // 5 orders, the right-only customer 14 and nothing extra from vip.
    assert_eq!(table.row_count(), 6);
    let name_idx = table.column_index("name").unwrap();
    let tier_idx = table.column_index("tier").unwrap();
    assert_eq!(table.cell(0, name_idx), Some("Alice"));
    assert_eq!(table.cell(0, tier_idx), Some("gold"));
    assert_eq!(table.cell(4, tier_idx), Some("silver"));
    assert_eq!(table.cell(4, name_idx), None, "customer 13 is unknown");
}

#[test]
fn inner_join_over_fixtures() {
    let orders = load_fixture("orders.csv");
    let customers = load_fixture("customers.csv");
    let spec = MergeSpec {
        kind: JoinKind::Inner,
        ..outer(&[
            ("orders", &orders, "customer_id"),
            ("customers", &customers, "customer_id"),
        ])
    };
    let table = merge_tables(&spec).unwrap().table;
    let ids: Vec<_> = table.column_values(0).collect();
    assert_eq!(ids, vec!["1", "2", "3", "4"]);
}

#[test]
fn placeholder_columns_are_dropped_from_merges() {
    let a = load("id,\n1,junk\n");
    let b = load("id,y\n1,b\n");
    let table = merge_tables(&outer(&[("a", &a, "id"), ("b", &b, "id")]))
        .unwrap()
        .table;
    assert_eq!(table.headers(), vec!["id", "y"]);
}

#[test]
fn append_unions_columns_in_first_seen_order() {
    let a = load("id,x\n1,a\n");
    let b = load("y,id\nq,2\n");
    let table = append_tables(&[("a", &a), ("b", &b)]).unwrap();
    assert_eq!(table.headers(), vec!["id", "x", "y"]);
    assert_eq!(table.row_count(), 2);
    assert_eq!(table.cell(1, 0), Some("2"));
    assert_eq!(table.cell(1, 1), None);
    assert_eq!(table.cell(0, 2), None);
    assert_eq!(table.columns()[0].kind, ColumnType::Numeric);
}
