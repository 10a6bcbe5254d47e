mod common;

use common::{
    books_document, id_of, list_changed_count, loaded_books, record_controller_events,
    visible_titles, Book, BookField,
};
use recordkit_core::{
    Category, ControllerEvent, ControllerState, Entity, EntityObject, EntityOperation,
    FieldMapping, FilterOperation, FilterRule, ListController, LoadStatus, PredicateMatcher,
    SimpleFilter, SortDirection, Sortings, Value, XmlElement, XmlError,
};

fn confirm_all(_: &str) -> bool {
    true
}

fn decline_all(_: &str) -> bool {
    false
}

#[test]
fn sort_filter_delete_scenario() {
    let mut controller = loaded_books(&[("A", 2000, 1), ("B", 2000, 2), ("C", 2000, 3)]);

    controller.set_sortings(Sortings::by(BookField::Rating, SortDirection::Descending));
    assert_eq!(visible_titles(&controller), ["C", "B", "A"]);

    let mut filter = SimpleFilter::default();
    filter.add_rule(
        FilterRule::new(BookField::Rating, FilterOperation::Greater, Value::Int(1)).unwrap(),
    );
    controller.set_quick_filter(filter);
    assert_eq!(visible_titles(&controller), ["C", "B"]);

    let b = id_of(&controller, "B");
    assert_eq!(controller.delete_items(&[b], confirm_all), 1);
    assert_eq!(controller.removed_count(), 1);
    assert_eq!(visible_titles(&controller), ["C"]);
    assert_eq!(controller.total_count(), 2);
    assert_eq!(controller.filtered_count(), 1);
}

#[test]
fn load_moves_controller_out_of_unloaded_state() {
    let mut controller = ListController::<Book>::new("Books");
    assert_eq!(controller.state(), ControllerState::Unloaded);
    let events = record_controller_events(&mut controller);

    let status = controller.load(Some(&books_document(&[("Emma", 1815, 3)])));

    assert_eq!(status, LoadStatus::Loaded);
    assert_eq!(controller.state(), ControllerState::Clean);
    assert_eq!(
        *events.borrow(),
        vec![ControllerEvent::Loaded, ControllerEvent::ListChanged]
    );
}

#[test]
fn confirmed_add_records_history_and_notifies_once() {
    let mut controller = loaded_books(&[("Dune", 1965, 5)]);
    let events = record_controller_events(&mut controller);

    let id = controller
        .add_item(|book: &mut Book| {
            book.set(BookField::Title, Value::from("Emma"));
            book.set(BookField::Year, Value::Int(1815));
            true
        })
        .unwrap();

    assert_eq!(controller.total_count(), 2);
    assert_eq!(controller.added_count(), 1);
    assert_eq!(controller.state(), ControllerState::Modified);
    assert_eq!(controller.get(id).map(|book| book.title()), Some("Emma".to_string()));
    assert_eq!(
        *events.borrow(),
        vec![
            ControllerEvent::EntityChanged {
                entity: id,
                operation: EntityOperation::Add
            },
            ControllerEvent::ModifiedChanged(true),
            ControllerEvent::ListChanged,
        ]
    );
}

#[test]
fn cancelled_add_changes_nothing() {
    let mut controller = loaded_books(&[("Dune", 1965, 5)]);
    let events = record_controller_events(&mut controller);

    let added = controller.add_item(|book: &mut Book| {
        book.set(BookField::Title, Value::from("Emma"));
        false
    });

    assert!(added.is_none());
    assert_eq!(controller.total_count(), 1);
    assert!(!controller.is_modified());
    assert!(controller.history().is_empty());
    assert!(events.borrow().is_empty());
}

#[test]
fn cancelled_edit_leaves_item_untouched() {
    let mut controller = loaded_books(&[("Dune", 1965, 5)]);
    let id = id_of(&controller, "Dune");
    let events = record_controller_events(&mut controller);

    let confirmed = controller.edit_item(id, |book: &mut Book| {
        book.set(BookField::Title, Value::from("Dune Messiah"));
        false
    });

    assert!(!confirmed);
    assert_eq!(controller.get(id).map(|book| book.title()), Some("Dune".to_string()));
    assert!(!controller.is_modified());
    assert!(events.borrow().is_empty());
}

#[test]
fn confirmed_edit_applies_draft_to_the_listed_item() {
    let mut controller = loaded_books(&[("Dune", 1965, 5), ("Emma", 1815, 3)]);
    let id = id_of(&controller, "Dune");
    let events = record_controller_events(&mut controller);

    let confirmed = controller.edit_item(id, |book: &mut Book| {
        book.set(BookField::Rating, Value::Int(4));
        book.set(BookField::Read, Value::Bool(true));
        true
    });

    assert!(confirmed);
    let book = controller.get(id).unwrap();
    assert_eq!(book.get(BookField::Rating), Value::Int(4));
    assert_eq!(book.get(BookField::Read), Value::Bool(true));
    assert!(book.is_modified());
    assert_eq!(controller.history().len(), 2);
    assert_eq!(controller.modified_count(), 1);
    assert_eq!(
        *events.borrow(),
        vec![
            ControllerEvent::EntityChanged {
                entity: id,
                operation: EntityOperation::Modify
            },
            ControllerEvent::ModifiedChanged(true),
            ControllerEvent::ListChanged,
        ]
    );
}

#[test]
fn confirmed_edit_keeps_member_changes() {
    let mut controller = loaded_books(&[("Dune", 1965, 5)]);
    let id = id_of(&controller, "Dune");
    let events = record_controller_events(&mut controller);

    let confirmed = controller.edit_item(id, |book: &mut Book| {
        book.set_author("Frank Herbert", "US");
        true
    });

    assert!(confirmed);
    let book = controller.get(id).unwrap();
    assert_eq!(
        book.author().map(|author| author.name().to_string()),
        Some("Frank Herbert".to_string())
    );
    assert_eq!(book.title(), "Dune");
    assert!(controller.is_modified());
    assert!(controller.history().is_empty());
    assert_eq!(list_changed_count(&events.borrow()), 1);
}

#[test]
fn member_only_change_refreshes_the_view() {
    let mut controller = loaded_books(&[("Dune", 1965, 5), ("Emma", 1815, 3)]);
    let id = id_of(&controller, "Emma");
    let events = record_controller_events(&mut controller);

    let changed = controller
        .modify_item(id, |book| book.set_author("Jane Austen", "UK"))
        .unwrap();

    assert!(changed);
    assert!(controller.is_modified());
    assert_eq!(
        *events.borrow(),
        vec![
            ControllerEvent::ModifiedChanged(true),
            ControllerEvent::ListChanged,
        ]
    );
}

#[test]
fn edit_of_unknown_item_is_rejected() {
    let mut controller = loaded_books(&[("Dune", 1965, 5)]);
    let mut opened = false;

    let confirmed = controller.edit_item(uuid::Uuid::new_v4(), |_: &mut Book| {
        opened = true;
        true
    });

    assert!(!confirmed);
    assert!(!opened);
}

#[test]
fn copy_item_adds_a_new_identity() {
    let mut controller = loaded_books(&[("Dune", 1965, 5)]);
    let source = id_of(&controller, "Dune");

    let copy = controller
        .copy_item(source, |book: &mut Book| {
            book.set(BookField::Title, Value::from("Dune (2nd copy)"));
            true
        })
        .unwrap();

    assert_ne!(copy, source);
    let original = controller.get(source).unwrap();
    let duplicate = controller.get(copy).unwrap();
    assert_ne!(duplicate.code(), original.code());
    assert_eq!(duplicate.get(BookField::Year), original.get(BookField::Year));
    assert_eq!(controller.added_count(), 1);
    assert_eq!(controller.total_count(), 2);
}

#[test]
fn inline_field_edit_reports_real_changes_only() {
    let mut controller = loaded_books(&[("Dune", 1965, 5)]);
    let id = id_of(&controller, "Dune");

    assert!(!controller.set_field(id, BookField::Year, 1965_i64));
    assert!(!controller.is_modified());

    assert!(controller.set_field(id, BookField::Year, 1966_i64));
    assert!(controller.is_modified());
    assert_eq!(controller.history().len(), 1);

    assert!(!controller.set_field(uuid::Uuid::new_v4(), BookField::Year, 1_i64));
}

#[test]
fn modify_item_records_every_changed_field() {
    let mut controller = loaded_books(&[("Dune", 1965, 5)]);
    let id = id_of(&controller, "Dune");

    let renamed = controller.modify_item(id, |book| {
        book.set(BookField::Title, Value::from("Children of Dune"));
        book.set(BookField::Year, Value::Int(1976));
        book.title()
    });

    assert_eq!(renamed.as_deref(), Some("Children of Dune"));
    let rows = controller.history_rows();
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|row| row.title == "Children of Dune"));
}

#[test]
fn batch_update_notifies_the_list_once() {
    let mut controller =
        loaded_books(&[("Dune", 1965, 5), ("Emma", 1815, 3), ("Ulysses", 1922, 4)]);
    let dune = id_of(&controller, "Dune");
    let emma = id_of(&controller, "Emma");
    controller.set_field(emma, BookField::Read, true);
    controller.save(Some(&mut XmlElement::new("Books")));

    let events = record_controller_events(&mut controller);
    let changed = controller.update_items(&[dune, emma], BookField::Read, true);

    assert_eq!(changed, 1);
    assert_eq!(controller.history().len(), 1);
    assert_eq!(list_changed_count(&events.borrow()), 1);
    assert!(events.borrow().contains(&ControllerEvent::ModifiedChanged(true)));
    assert!(controller
        .full_items()
        .iter()
        .filter(|book| book.get(BookField::Read) == Value::Bool(true))
        .all(|book| book.id() == dune || book.id() == emma));
}

#[test]
fn delete_asks_with_item_count() {
    let mut controller = loaded_books(&[("Dune", 1965, 5), ("Emma", 1815, 3), ("Ulysses", 1922, 4)]);
    let ids: Vec<_> = controller.full_items().ids().collect();
    let mut asked = Vec::new();

    let removed = controller.delete_items(&[ids[0], ids[0]], |message: &str| {
        asked.push(message.to_string());
        false
    });
    assert_eq!(removed, 0);

    controller.delete_items(&ids, |message: &str| {
        asked.push(message.to_string());
        false
    });

    assert_eq!(
        asked,
        [
            "Are you sure you want to delete selected item?",
            "Are you sure you want to delete selected (3) items?",
        ]
    );
    assert_eq!(controller.total_count(), 3);
    assert!(!controller.is_modified());
}

#[test]
fn declined_delete_is_a_no_op() {
    let mut controller = loaded_books(&[("Dune", 1965, 5)]);
    let id = id_of(&controller, "Dune");
    let events = record_controller_events(&mut controller);

    assert_eq!(controller.delete_items(&[id], decline_all), 0);
    assert!(events.borrow().is_empty());

    assert_eq!(controller.delete_items(&[uuid::Uuid::new_v4()], confirm_all), 0);
}

#[test]
fn deleting_many_recomputes_the_view_once() {
    let mut controller = loaded_books(&[
        ("Dune", 1965, 5),
        ("Emma", 1815, 3),
        ("Ulysses", 1922, 4),
        ("Persuasion", 1817, 3),
    ]);
    let targets: Vec<_> = controller.full_items().ids().take(3).collect();
    let events = record_controller_events(&mut controller);

    assert_eq!(controller.delete_items(&targets, confirm_all), 3);

    let delivered = events.borrow();
    assert_eq!(list_changed_count(&delivered), 1);
    let removals = delivered
        .iter()
        .filter(|event| {
            matches!(
                event,
                ControllerEvent::EntityChanged {
                    operation: EntityOperation::Remove,
                    ..
                }
            )
        })
        .count();
    assert_eq!(removals, 3);
    assert_eq!(controller.removed_count(), 3);
    assert_eq!(visible_titles(&controller), ["Persuasion"]);
}

#[test]
fn category_filters_the_view_and_has_its_own_event() {
    let mut controller = loaded_books(&[("Dune", 1965, 5), ("Emma", 1815, 3)]);
    let events = record_controller_events(&mut controller);

    controller.set_category(Some(Category::new(
        "Classics",
        PredicateMatcher(|book: &Book| book.get(BookField::Year).to_int() < 1900),
    )));

    assert_eq!(controller.category().map(Category::name), Some("Classics"));
    assert_eq!(visible_titles(&controller), ["Emma"]);
    assert_eq!(
        *events.borrow(),
        vec![ControllerEvent::CategoryChanged, ControllerEvent::ListChanged]
    );

    controller.set_category(None);
    assert_eq!(controller.filtered_count(), 2);
}

#[test]
fn renew_reports_whether_the_view_changed() {
    let mut controller = loaded_books(&[("Dune", 1965, 5)]);
    assert!(!controller.renew_visible_items());

    let id = id_of(&controller, "Dune");
    controller.set_field(id, BookField::Rating, 4_i64);
    assert!(!controller.renew_visible_items());
    assert_eq!(controller.visible_items().len(), 1);
}

#[test]
fn save_clears_dirty_state_and_history() {
    let mut controller = loaded_books(&[("Dune", 1965, 5)]);
    controller.add_item(|book: &mut Book| {
        book.set(BookField::Title, Value::from("Emma"));
        true
    });
    let events = record_controller_events(&mut controller);

    controller.save(None);
    assert!(controller.is_modified());

    let mut root = XmlElement::new("Books");
    controller.save(Some(&mut root));

    assert_eq!(controller.state(), ControllerState::Clean);
    assert!(controller.history().is_empty());
    assert!(controller.full_items().iter().all(|book| !book.is_modified()));
    assert_eq!(root.children_named("Book").count(), 2);
    assert!(events.borrow().contains(&ControllerEvent::ModifiedChanged(false)));
}

#[test]
fn save_writes_items_in_sort_order() {
    let mut controller = loaded_books(&[("Emma", 1815, 3), ("Dune", 1965, 5)]);
    controller.set_sortings(Sortings::by(BookField::Title, SortDirection::Ascending));
    controller.add_item(|book: &mut Book| {
        book.set(BookField::Title, Value::from("Beloved"));
        true
    });

    let mut root = XmlElement::new("Books");
    controller.save(Some(&mut root));

    let written: Vec<_> = root
        .children_named("Book")
        .filter_map(|book| book.attribute("Title"))
        .collect();
    assert_eq!(written, ["Beloved", "Dune", "Emma"]);
}

#[test]
fn reload_discards_unsaved_changes() {
    let mut controller = loaded_books(&[("Dune", 1965, 5)]);
    let id = id_of(&controller, "Dune");
    controller.set_field(id, BookField::Rating, 1_i64);
    let events = record_controller_events(&mut controller);

    controller.load(Some(&books_document(&[("Emma", 1815, 3)])));

    assert!(!controller.is_modified());
    assert!(controller.history().is_empty());
    assert_eq!(visible_titles(&controller), ["Emma"]);
    assert_eq!(events.borrow()[0], ControllerEvent::ModifiedChanged(false));
}

#[test]
fn file_round_trip_restores_the_list() {
    let dir = tempfile::tempdir().unwrap();
    let mut controller = loaded_books(&[("Dune", 1965, 5), ("Emma", 1815, 3)]);
    let path = dir.path().join(controller.file_name());
    assert!(path.ends_with("Books.xml"));

    controller.add_item(|book: &mut Book| {
        book.set(BookField::Title, Value::from("Ulysses"));
        book.set(BookField::Notes, Value::from("Bloomsday\nDublin"));
        book.set_author("James Joyce", "IE");
        true
    });
    controller.save_file(&path).unwrap();
    assert!(!controller.is_modified());

    let mut restored = ListController::<Book>::new("Books");
    assert_eq!(restored.load_file(&path).unwrap(), LoadStatus::Loaded);
    assert_eq!(restored.total_count(), 3);
    assert_eq!(restored.full_items(), controller.full_items());
    let ulysses = restored.get(id_of(&restored, "Ulysses")).unwrap();
    assert_eq!(ulysses.author().unwrap().name(), "James Joyce");
    assert_eq!(ulysses.get(BookField::Notes), Value::from("Bloomsday\nDublin"));
}

#[test]
fn missing_file_loads_as_empty_list() {
    let dir = tempfile::tempdir().unwrap();
    let mut controller = ListController::<Book>::new("Books");

    let status = controller.load_file(dir.path().join("Books.xml")).unwrap();

    assert_eq!(status, LoadStatus::NotFound);
    assert!(controller.is_loaded());
    assert_eq!(controller.total_count(), 0);
}

#[test]
fn unreadable_file_is_reported_and_keeps_current_items() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("Books.xml");
    std::fs::write(&path, "<Books><Book Title=\"Dune\"").unwrap();
    let mut controller = loaded_books(&[("Emma", 1815, 3)]);

    let result = controller.load_file(&path);

    assert!(matches!(result, Err(XmlError::Parse(_))));
    assert_eq!(visible_titles(&controller), ["Emma"]);
}

#[test]
fn item_lookup_by_field_value() {
    let controller = loaded_books(&[("Dune", 1965, 5), ("Emma", 1815, 3)]);

    let emma = controller.item(BookField::Year, &Value::Int(1815));
    assert_eq!(emma.map(|book| book.title()), Some("Emma".to_string()));
    assert!(controller.item(BookField::Year, &Value::Int(2020)).is_none());
}

#[test]
fn stored_settings_drive_the_view() {
    let mut controller = loaded_books(&[("Dune", 1965, 5), ("Emma", 1815, 3), ("Ulysses", 1922, 4)]);
    let settings = XmlElement::parse(
        r#"<Settings>
             <Sortings><Sorting Field="Year" Direction="desc" /></Sortings>
             <QuickFilter Concat="and"><Rule Field="Rating" Operation="greater_or_equal" Value="4" /></QuickFilter>
           </Settings>"#,
    )
    .unwrap();

    controller.load_settings(Some(&settings)).unwrap();
    assert_eq!(visible_titles(&controller), ["Dune", "Ulysses"]);

    let mut saved = XmlElement::new("Books");
    controller.save_settings(&mut saved);
    assert_eq!(
        saved
            .child("Settings")
            .and_then(|element| element.child("Sortings"))
            .map(|element| element.children().len()),
        Some(1)
    );
}
