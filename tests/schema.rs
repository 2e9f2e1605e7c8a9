use proptest::prelude::*;
use tabular_import::{
    parsers::{ParsedFile, RawRow},
    schema::build_table_plan,
};

fn header() -> impl Strategy<Value = String> {
    prop_oneof![
        prop::sample::select(vec![
            "id", "ID", "Id ", "customer_id", "Customer ID", "code", "key", "no", "number", "name",
            "Name", "row_id", "", "  ", "1st", "value",
        ])
        .prop_map(str::to_string),
        "[A-Za-z_ ]{0,12}",
    ]
}

fn cell() -> impl Strategy<Value = Option<String>> {
    prop::option::weighted(0.8, prop_oneof!["[0-9]{1,3}", "[a-z]{0,5}", Just("null".to_string())])
}

/// Distinct raw headers, as the parsers produce, with rows of matching width.
fn parsed_file() -> impl Strategy<Value = ParsedFile> {
    prop::collection::btree_set(header(), 0..8).prop_flat_map(|headers| {
        let headers: Vec<String> = headers.into_iter().collect();
        let width = headers.len();
        prop::collection::vec(prop::collection::vec(cell(), width), 1..12).prop_map(
            move |rows| {
                let rows = rows
                    .into_iter()
                    .map(|cells| RawRow::from_pairs(headers.iter().cloned().zip(cells)))
                    .collect();
                ParsedFile::new(headers.clone(), rows)
            },
        )
    })
}

proptest! {
    #[test]
    fn plans_have_exactly_one_primary_key(parsed in parsed_file(), sample in 0usize..6) {
        let plan = build_table_plan(&parsed, sample);
        let primary: Vec<&str> = plan
            .columns
            .iter()
            .filter(|c| c.is_primary)
            .map(|c| c.name.as_str())
            .collect();
        prop_assert_eq!(primary.len(), 1, "headers {:?}", parsed.headers);
        prop_assert!(plan.validate().is_ok(), "{:?}", plan.validate());
    }

    #[test]
    fn plans_keep_every_source_column(parsed in parsed_file()) {
        let plan = build_table_plan(&parsed, 0);
        let from_source = plan.columns.iter().filter(|c| !c.is_generated).count();
        prop_assert_eq!(from_source, parsed.headers.len());
    }
}
