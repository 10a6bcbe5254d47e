#![allow(dead_code)]

use recordkit_core::{
    load_fields, save_fields, ControllerEvent, Entity, EntityEvent, EntityId, EntityObject,
    EntityState, FieldKey, FieldKind, FieldMapping, FieldMeta, ListController, LoadError,
    MemberSlot, Value, XmlElement,
};
use std::cell::RefCell;
use std::rc::Rc;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthorField {
    Name,
    Country,
}

static AUTHOR_FIELDS: [FieldMeta; 2] = [
    FieldMeta::new("Name", "Author", FieldKind::Text),
    FieldMeta::new("Country", "Country", FieldKind::Text),
];

impl FieldKey for AuthorField {
    const ALL: &'static [Self] = &[Self::Name, Self::Country];

    fn meta(self) -> &'static FieldMeta {
        &AUTHOR_FIELDS[self as usize]
    }
}

#[derive(Debug, Default)]
pub struct Author {
    state: EntityState,
    name: String,
    country: String,
}

impl Author {
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl FieldMapping for Author {
    type Field = AuthorField;

    fn get(&self, field: AuthorField) -> Value {
        match field {
            AuthorField::Name => Value::from(self.name.as_str()),
            AuthorField::Country => Value::from(self.country.as_str()),
        }
    }

    fn set(&mut self, field: AuthorField, value: Value) -> bool {
        match field {
            AuthorField::Name => self.state.assign(&mut self.name, value.to_text()),
            AuthorField::Country => self.state.assign(&mut self.country, value.to_text()),
        }
    }
}

impl EntityObject for Author {
    fn state(&self) -> &EntityState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut EntityState {
        &mut self.state
    }

    fn default_xml_element_name(&self) -> &'static str {
        Self::ELEMENT_NAME
    }

    fn init(&mut self) {
        self.name.clear();
        self.country.clear();
    }

    fn save_data(&self, element: &mut XmlElement) {
        save_fields(self, element);
    }

    fn load_data(&mut self, element: &XmlElement) -> Result<(), LoadError> {
        load_fields(self, element)
    }

    fn is_empty(&self) -> bool {
        self.name.is_empty() && self.country.is_empty()
    }
}

impl Entity for Author {
    const ELEMENT_NAME: &'static str = "Author";

    fn title(&self) -> String {
        self.name.clone()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BookField {
    Title,
    Year,
    Rating,
    Read,
    Code,
    Notes,
    TitleLength,
}

static BOOK_FIELDS: [FieldMeta; 7] = [
    FieldMeta::new("Title", "Title", FieldKind::Text),
    FieldMeta::new("Year", "Year", FieldKind::Int),
    FieldMeta::new("Rating", "Rating", FieldKind::Int),
    FieldMeta::new("Read", "Read", FieldKind::Bool),
    FieldMeta::new("Code", "Code", FieldKind::Guid),
    FieldMeta::new("Notes", "Notes", FieldKind::Text).as_element(),
    FieldMeta::new("TitleLength", "Title length", FieldKind::Int).calculated(),
];

impl FieldKey for BookField {
    const ALL: &'static [Self] = &[
        Self::Title,
        Self::Year,
        Self::Rating,
        Self::Read,
        Self::Code,
        Self::Notes,
        Self::TitleLength,
    ];

    fn meta(self) -> &'static FieldMeta {
        &BOOK_FIELDS[self as usize]
    }
}

/// Library record owning one `Author` member.
#[derive(Debug)]
pub struct Book {
    state: EntityState,
    title: String,
    year: i64,
    rating: i64,
    read: bool,
    code: Uuid,
    notes: String,
    author: MemberSlot<Author>,
}

impl Default for Book {
    fn default() -> Self {
        let mut state = EntityState::new();
        let author = state.add_member(Author::default());
        Self {
            state,
            title: String::new(),
            year: 0,
            rating: 0,
            read: false,
            code: Uuid::nil(),
            notes: String::new(),
            author,
        }
    }
}

impl Book {
    /// Fresh, unmodified book with a unique code.
    pub fn sample(title: &str, year: i64, rating: i64) -> Self {
        Self {
            title: title.to_string(),
            year,
            rating,
            code: Uuid::new_v4(),
            ..Self::default()
        }
    }

    pub fn author_slot(&self) -> MemberSlot<Author> {
        self.author
    }

    pub fn author(&self) -> Option<&Author> {
        self.member(self.author)
    }

    pub fn set_author(&mut self, name: &str, country: &str) -> bool {
        self.modify_member(self.author, |author| {
            let renamed = author.set(AuthorField::Name, Value::from(name));
            let moved = author.set(AuthorField::Country, Value::from(country));
            renamed || moved
        })
        .unwrap_or(false)
    }

    pub fn code(&self) -> Uuid {
        self.code
    }
}

impl FieldMapping for Book {
    type Field = BookField;

    fn get(&self, field: BookField) -> Value {
        match field {
            BookField::Title => Value::from(self.title.as_str()),
            BookField::Year => Value::Int(self.year),
            BookField::Rating => Value::Int(self.rating),
            BookField::Read => Value::Bool(self.read),
            BookField::Code => Value::Guid(self.code),
            BookField::Notes => Value::from(self.notes.as_str()),
            BookField::TitleLength => Value::Int(self.title.chars().count() as i64),
        }
    }

    fn set(&mut self, field: BookField, value: Value) -> bool {
        match field {
            BookField::Title => self.state.assign(&mut self.title, value.to_text()),
            BookField::Year => self.state.assign(&mut self.year, value.to_int()),
            BookField::Rating => self.state.assign(&mut self.rating, value.to_int()),
            BookField::Read => self.state.assign(&mut self.read, value.to_bool()),
            BookField::Code => self.state.assign(&mut self.code, value.to_guid()),
            BookField::Notes => self.state.assign(&mut self.notes, value.to_text()),
            BookField::TitleLength => false,
        }
    }
}

impl EntityObject for Book {
    fn state(&self) -> &EntityState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut EntityState {
        &mut self.state
    }

    fn default_xml_element_name(&self) -> &'static str {
        Self::ELEMENT_NAME
    }

    fn init(&mut self) {
        self.title.clear();
        self.year = 0;
        self.rating = 0;
        self.read = false;
        self.code = Uuid::nil();
        self.notes.clear();
    }

    fn save_data(&self, element: &mut XmlElement) {
        save_fields(self, element);
    }

    fn load_data(&mut self, element: &XmlElement) -> Result<(), LoadError> {
        load_fields(self, element)
    }

    fn init_unique_copy(&mut self) {
        self.set(BookField::Code, Value::Guid(Uuid::new_v4()));
    }
}

impl Entity for Book {
    const ELEMENT_NAME: &'static str = "Book";

    fn title(&self) -> String {
        self.title.clone()
    }

    fn extract_key_value(&self) -> Option<Value> {
        Some(Value::Guid(self.code))
    }
}

pub fn record_entity_events(state: &mut EntityState) -> Rc<RefCell<Vec<EntityEvent>>> {
    let events = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&events);
    state.subscribe(move |event| sink.borrow_mut().push(event.clone()));
    events
}

pub fn record_controller_events<E: Entity>(
    controller: &mut ListController<E>,
) -> Rc<RefCell<Vec<ControllerEvent>>> {
    let events = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&events);
    controller.subscribe(move |event| sink.borrow_mut().push(event.clone()));
    events
}

pub fn list_changed_count(events: &[ControllerEvent]) -> usize {
    events
        .iter()
        .filter(|event| **event == ControllerEvent::ListChanged)
        .count()
}

/// `<Books>` document with one element per `(title, year, rating)`.
pub fn books_document(rows: &[(&str, i64, i64)]) -> XmlElement {
    let mut root = XmlElement::new("Books");
    for (title, year, rating) in rows {
        let book = root.append_element("Book");
        book.set_attribute("Title", *title);
        book.set_attribute("Year", year.to_string());
        book.set_attribute("Rating", rating.to_string());
        book.set_attribute("Code", Uuid::new_v4().to_string());
    }
    root
}

pub fn loaded_books(rows: &[(&str, i64, i64)]) -> ListController<Book> {
    let mut controller = ListController::new("Books");
    controller.load(Some(&books_document(rows)));
    controller
}

pub fn id_of(controller: &ListController<Book>, title: &str) -> EntityId {
    controller
        .item(BookField::Title, &Value::from(title))
        .map(|book| book.id())
        .unwrap()
}

pub fn visible_titles(controller: &ListController<Book>) -> Vec<String> {
    controller
        .visible_entities()
        .into_iter()
        .map(|book| book.title())
        .collect()
}
