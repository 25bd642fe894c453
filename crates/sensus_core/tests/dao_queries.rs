mod common;

use common::{seed_people, test_factory, Person};
use sensus_core::{Criteria, DataAccessError, GenericDao, MatchMode, Predicate, Value};
use std::sync::Arc;

fn seeded_dao() -> (tempfile::TempDir, GenericDao<Person>) {
    let (dir, factory) = test_factory();
    let dao = GenericDao::<Person>::with_factory(Arc::clone(&factory)).unwrap();
    for mut person in seed_people() {
        dao.save(&mut person).unwrap();
    }
    (dir, dao)
}

fn surnames(people: &[Person]) -> Vec<&str> {
    people.iter().map(|person| person.surname.as_str()).collect()
}

#[test]
fn like_anywhere_matches_substrings_case_insensitively() {
    let (_dir, mut dao) = seeded_dao();

    dao.add_like_anywhere("surname", "smith");
    let found = dao.find_by_criteria(None).unwrap();

    assert_eq!(
        surnames(&found),
        ["Smithson", "Blacksmith", "smith", "Smith"]
    );
}

#[test]
fn like_start_matches_prefix_only() {
    let (_dir, mut dao) = seeded_dao();

    dao.add_like("surname", "smith", MatchMode::Start);
    let found = dao.find_by_criteria(None).unwrap();

    assert!(surnames(&found).contains(&"Smithson"));
    assert!(!surnames(&found).contains(&"Blacksmith"));
}

#[test]
fn like_end_and_exact_modes() {
    let (_dir, dao) = seeded_dao();

    let ends = dao
        .find_matching(&Criteria::new().like("surname", "smith", MatchMode::End))
        .unwrap();
    assert_eq!(surnames(&ends), ["Blacksmith", "smith", "Smith"]);

    let exact = dao
        .find_matching(&Criteria::new().like("surname", "SMITH", MatchMode::Exact))
        .unwrap();
    assert_eq!(surnames(&exact), ["smith", "Smith"]);
}

#[test]
fn like_wildcards_in_input_match_literally() {
    let (_dir, dao) = seeded_dao();
    dao.save(&mut Person::new("Percent", "100%_real", 30))
        .unwrap();

    let found = dao
        .find_matching(&Criteria::new().like_anywhere("surname", "0%_"))
        .unwrap();
    assert_eq!(surnames(&found), ["100%_real"]);

    let none = dao
        .find_matching(&Criteria::new().like_anywhere("surname", "%"))
        .unwrap();
    assert_eq!(none.len(), 1);
}

#[test]
fn between_is_inclusive() {
    let (_dir, mut dao) = seeded_dao();

    dao.add_between("age", 18, 42);
    let ages: Vec<i64> = dao
        .find_by_criteria(None)
        .unwrap()
        .iter()
        .map(|person| person.age)
        .collect();

    assert_eq!(ages, [34, 18, 27, 42]);
}

#[test]
fn predicates_combine_conjunctively() {
    let (_dir, mut dao) = seeded_dao();

    dao.add_like_anywhere("surname", "smith")
        .add_between("age", 30, 60)
        .add_equals("name", "Bruno");
    let found = dao.find_by_criteria(None).unwrap();

    assert_eq!(surnames(&found), ["Blacksmith"]);
}

#[test]
fn row_count_matches_find_by_criteria_length() {
    let (_dir, mut dao) = seeded_dao();

    assert_eq!(dao.row_count(None).unwrap(), 7);

    dao.add_like_anywhere("surname", "smith");
    let found = dao.find_by_criteria(None).unwrap();
    assert_eq!(dao.row_count(None).unwrap(), found.len() as u64);

    dao.add_sort_descending("age");
    assert_eq!(dao.row_count(None).unwrap(), 4);
}

#[test]
fn sorts_apply_in_order_with_key_tiebreak() {
    let (_dir, mut dao) = seeded_dao();
    dao.save(&mut Person::new("Zeno", "Rossi", 65)).unwrap();

    dao.add_sort_descending("age").add_sort_ascending("surname");
    let found = dao.find_by_criteria(None).unwrap();

    let names: Vec<&str> = found.iter().map(|person| person.name.as_str()).collect();
    assert_eq!(
        names,
        ["Dario", "Zeno", "Bruno", "Fabio", "Anna", "Elena", "Carla", "Giulia"]
    );
}

#[test]
fn accumulator_survives_queries_until_cleared() {
    let (_dir, mut dao) = seeded_dao();

    dao.add_between("age", 40, 70);
    assert_eq!(dao.find_by_criteria(None).unwrap().len(), 3);
    assert_eq!(dao.find_by_criteria(None).unwrap().len(), 3);
    assert_eq!(dao.criteria().predicates().len(), 1);

    dao.clear_criteria();
    assert!(dao.criteria().is_empty());
    assert_eq!(dao.find_by_criteria(None).unwrap().len(), 7);
}

#[test]
fn explicit_predicates_replace_accumulated_ones_but_keep_sorts() {
    let (_dir, mut dao) = seeded_dao();
    dao.add_equals("name", "Anna".to_string())
        .add_sort_descending("age");

    let explicit = [Predicate::Between {
        field: "age".to_string(),
        lower: Value::Integer(40),
        upper: Value::Integer(70),
    }];
    let found = dao.find_by_criteria(Some(&explicit)).unwrap();

    let ages: Vec<i64> = found.iter().map(|person| person.age).collect();
    assert_eq!(ages, [65, 51, 42]);
    assert_eq!(dao.row_count(Some(&explicit)).unwrap(), 3);
    assert_eq!(dao.row_count(None).unwrap(), 1);
}

#[test]
fn find_all_ignores_accumulated_criteria() {
    let (_dir, mut dao) = seeded_dao();
    dao.add_equals("name", "Anna");

    assert_eq!(dao.find_all().unwrap().len(), 7);
}

#[test]
fn paginate_is_repeatable_and_pages_concatenate_to_full_result() {
    let (_dir, mut dao) = seeded_dao();
    dao.add_sort_ascending("surname");

    let first = dao.paginate(0, 3, None).unwrap();
    assert_eq!(first, dao.paginate(0, 3, None).unwrap());

    let mut concatenated = first;
    concatenated.extend(dao.paginate(3, 3, None).unwrap());
    concatenated.extend(dao.paginate(6, 3, None).unwrap());

    assert_eq!(concatenated, dao.find_by_criteria(None).unwrap());
    assert!(dao.paginate(7, 3, None).unwrap().is_empty());
    assert!(dao.paginate(0, 0, None).unwrap().is_empty());
}

#[test]
fn paginate_matching_filters_before_slicing() {
    let (_dir, dao) = seeded_dao();
    let criteria = Criteria::new().like_anywhere("surname", "smith");

    let page = dao.paginate_matching(&criteria, 1, 2).unwrap();
    assert_eq!(surnames(&page), ["Blacksmith", "smith"]);
    assert_eq!(dao.count_matching(&criteria).unwrap(), 4);
}

#[test]
fn unknown_field_is_rejected_without_touching_storage() {
    let (_dir, mut dao) = seeded_dao();

    dao.add_equals("salary", 1000);
    let err = dao.find_by_criteria(None).unwrap_err();
    assert!(matches!(
        err,
        DataAccessError::UnknownField { entity: "person", ref field } if field == "salary"
    ));
    assert_eq!(dao.factory().unwrap().live_connections(), 0);
}

#[test]
fn columns_can_be_addressed_by_storage_name() {
    let (_dir, dao) = seeded_dao();

    let found = dao
        .find_matching(&Criteria::new().equals("first_name", "Elena".to_string()))
        .unwrap();
    assert_eq!(surnames(&found), ["Bianchi"]);
}
