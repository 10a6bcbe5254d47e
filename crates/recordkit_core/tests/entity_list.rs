mod common;

use common::{books_document, Book, BookField};
use recordkit_core::{
    Entity, EntityId, EntityList, EntityObject, FieldChange, FieldMapping, FilterOperation,
    FilterRule, LoadStatus, PredicateMatcher, SimpleFilter, SortDirection, Sortings, Value,
    XmlElement,
};

fn titles(list: &EntityList<Book>) -> Vec<String> {
    list.iter().map(|book| book.title()).collect()
}

fn library(rows: &[(&str, i64, i64)]) -> EntityList<Book> {
    let mut list = EntityList::new();
    for (title, year, rating) in rows {
        list.add(Book::sample(title, *year, *rating));
    }
    list.mark_saved();
    list
}

#[test]
fn add_and_remove_mark_the_list_modified() {
    let mut list = EntityList::<Book>::new();
    assert!(!list.is_modified());

    let dune = list.add(Book::sample("Dune", 1965, 5));
    let emma = list.add(Book::sample("Emma", 1815, 3));
    assert_eq!(list.len(), 2);
    assert!(list.is_modified());
    assert_eq!(list.position(emma), Some(1));
    assert_eq!(list.get(dune).map(|book| book.title()), Some("Dune".to_string()));

    list.mark_saved();
    let removed = list.remove(emma).unwrap();
    assert_eq!(removed.title(), "Emma");
    assert!(list.is_modified());
    assert!(!list.contains(emma));
    assert!(list.remove(emma).is_none());
}

#[test]
fn modify_reports_persisted_field_diffs() {
    let mut list = library(&[("Dune", 1965, 5)]);
    let id = list.ids().next().unwrap();

    let (changed, changes) = list
        .modify(id, |book| book.set(BookField::Title, Value::from("Dune Messiah")))
        .unwrap();

    assert!(changed);
    assert_eq!(
        changes,
        vec![FieldChange {
            entity: id,
            field: BookField::Title,
            old_value: Value::from("Dune"),
            new_value: Value::from("Dune Messiah"),
        }]
    );
    assert!(list.is_modified());
}

#[test]
fn unchanged_assignment_leaves_list_clean() {
    let mut list = library(&[("Dune", 1965, 5)]);
    let id = list.ids().next().unwrap();

    let changes = list.set_field(id, BookField::Year, Value::Int(1965)).unwrap();
    assert!(changes.is_empty());
    assert!(!list.is_modified());

    assert!(list
        .set_field(EntityId::new_v4(), BookField::Year, Value::Int(1))
        .is_none());
}

#[test]
fn member_edit_marks_list_modified_without_field_diff() {
    let mut list = library(&[("Dune", 1965, 5)]);
    let id = list.ids().next().unwrap();

    let (_, changes) = list
        .modify(id, |book| book.set_author("Frank Herbert", "US"))
        .unwrap();

    assert!(changes.is_empty());
    assert!(list.is_modified());
}

#[test]
fn sort_is_stable_and_reports_reorders() {
    let mut list = library(&[
        ("Alpha", 2001, 1),
        ("Bravo", 1990, 1),
        ("Charlie", 2001, 1),
        ("Delta", 1980, 1),
    ]);
    let by_year = Sortings::<Book>::by(BookField::Year, SortDirection::Ascending);

    assert!(list.sort(&by_year));
    assert_eq!(titles(&list), ["Delta", "Bravo", "Alpha", "Charlie"]);
    assert!(!list.sort(&by_year));
    assert!(!list.sort(&Sortings::new()));

    let newest_first = Sortings::<Book>::by(BookField::Year, SortDirection::Descending)
        .then(BookField::Title, SortDirection::Descending);
    list.sort(&newest_first);
    assert_eq!(titles(&list), ["Charlie", "Alpha", "Bravo", "Delta"]);
}

#[test]
fn computed_sort_key_orders_by_derived_value() {
    let mut list = library(&[("Emma", 1815, 3), ("Dune", 1965, 5), ("Ulysses", 1922, 4)]);
    let by_length = Sortings::<Book>::new().then_computed(
        "TitleLengthThenYear",
        |book| {
            let length = book.get(BookField::TitleLength).to_int();
            Value::Int(length * 10_000 + book.get(BookField::Year).to_int())
        },
        SortDirection::Ascending,
    );

    list.sort(&by_length);
    assert_eq!(titles(&list), ["Emma", "Dune", "Ulysses"]);
}

#[test]
fn filtered_list_is_pure() {
    let list = library(&[("Emma", 1815, 3), ("Dune", 1965, 5), ("Ulysses", 1922, 4)]);
    let order_before: Vec<EntityId> = list.ids().collect();
    let mut snapshot_root = XmlElement::new("Books");
    list.write(&mut snapshot_root);
    let mut snapshot = EntityList::<Book>::new();
    snapshot.load(Some(&snapshot_root));

    let mut filter = SimpleFilter::default();
    filter.add_rule(
        FilterRule::new(BookField::Rating, FilterOperation::GreaterOrEqual, Value::Int(4)).unwrap(),
    );
    let projection = list.filtered_list(
        Some(&filter),
        &Sortings::by(BookField::Title, SortDirection::Descending),
    );

    let visible: Vec<String> = projection
        .resolve(&list)
        .into_iter()
        .map(|book| book.title())
        .collect();
    assert_eq!(visible, ["Ulysses", "Dune"]);
    assert_eq!(list.ids().collect::<Vec<_>>(), order_before);
    assert!(list.equals(&snapshot));
    assert!(!list.is_modified());
}

#[test]
fn empty_matcher_keeps_every_item() {
    let list = library(&[("Emma", 1815, 3), ("Dune", 1965, 5)]);
    let filter = SimpleFilter::<BookField>::default();

    let projection = list.filtered_list(Some(&filter), &Sortings::new());
    assert_eq!(projection.ids().collect::<Vec<_>>(), list.ids().collect::<Vec<_>>());
    assert_eq!(list.filtered_list(None, &Sortings::new()), projection);
}

#[test]
fn projection_equality_tracks_content_not_just_membership() {
    let mut list = library(&[("Emma", 1815, 3), ("Dune", 1965, 5)]);
    let sortings = Sortings::<Book>::new();
    let first = list.filtered_list(None, &sortings);
    assert_eq!(first, list.filtered_list(None, &sortings));

    let id = list.ids().next().unwrap();
    list.set_field(id, BookField::Rating, Value::Int(4));
    let edited = list.filtered_list(None, &sortings);
    assert_ne!(first, edited);
    assert_eq!(
        first.ids().collect::<Vec<_>>(),
        edited.ids().collect::<Vec<_>>()
    );
}

#[test]
fn iter_matching_is_lazy_and_restartable() {
    let list = library(&[("Emma", 1815, 3), ("Dune", 1965, 5), ("Ulysses", 1922, 4)]);
    let classics = PredicateMatcher(|book: &Book| book.get(BookField::Year).to_int() < 1950);

    let matching = list.iter_matching(&classics);
    let again = matching.clone();
    assert_eq!(
        matching.map(|book| book.title()).collect::<Vec<_>>(),
        ["Emma", "Ulysses"]
    );
    assert_eq!(again.count(), 2);

    let mut seen = 0;
    list.for_each_matching(&classics, |_| seen += 1);
    assert_eq!(seen, 2);
}

#[test]
fn find_by_field_returns_first_match() {
    let list = library(&[("Emma", 1815, 3), ("Dune", 1965, 5), ("Persuasion", 1817, 3)]);

    let found = list
        .find_by_field(BookField::Rating, &Value::Int(3))
        .map(|book| book.title());
    assert_eq!(found, Some("Emma".to_string()));
    assert!(list
        .find_by_field(BookField::Title, &Value::from("Ulysses"))
        .is_none());
    assert!(list.find(|book| book.get(BookField::Year).to_int() > 1900).is_some());
}

#[test]
fn list_saves_items_as_sibling_elements() {
    let mut list = library(&[("Emma", 1815, 3), ("Dune", 1965, 5)]);
    list.add(Book::sample("Ulysses", 1922, 4));

    let mut root = XmlElement::new("Books");
    list.save(Some(&mut root), true);
    assert!(!list.is_modified());
    assert!(list.iter().all(|book| !book.is_modified()));
    assert_eq!(root.children_named("Book").count(), 3);
    assert!(root.child("Items").is_none());

    let mut restored = EntityList::<Book>::new();
    assert_eq!(restored.load(Some(&root)), LoadStatus::Loaded);
    assert_eq!(restored, list);
    assert!(restored.ids().all(|id| !list.contains(id)));
    assert!(!restored.is_modified());
}

#[test]
fn malformed_items_are_skipped_on_load() {
    let mut root = books_document(&[("Emma", 1815, 3), ("Dune", 1965, 5)]);
    root.append_element("Book").set_attribute("Year", "soon");
    root.append_element("Magazine").set_attribute("Title", "Wired");

    let mut list = EntityList::<Book>::new();
    assert_eq!(list.load(Some(&root)), LoadStatus::Loaded);
    assert_eq!(titles(&list), ["Emma", "Dune"]);
}

#[test]
fn loading_replaces_previous_items() {
    let mut list = library(&[("Ulysses", 1922, 4)]);
    list.add(Book::sample("Persuasion", 1817, 3));

    list.load(Some(&books_document(&[("Emma", 1815, 3)])));
    assert_eq!(titles(&list), ["Emma"]);
    assert!(!list.is_modified());

    list.load(None);
    assert!(list.is_empty());
}
