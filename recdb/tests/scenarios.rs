use pretty_assertions::assert_eq;
use recdb::fex::{Fex, FexKind};
use recdb::{
    integrity_check, Database, DeleteOptions, Field, InsertOptions, QueryOptions, RecError, Record,
    Selector, SetAction, SetOptions, Sex,
};
use tempfile::TempDir;

const BOOKS: &str = "\
# Books in my library
%rec: Book
%mandatory: Title
%type: Location enum home loaned office

Title: GNU Emacs Manual
Author: Richard M. Stallman
Publisher: FSF
Location: home

Title: The Colour of Magic
Author: Terry Pratchett
Location: loaned

Title: Neuromancer
Author: William Gibson
Location: home

Title: Alice in Wonderland
Location: home
";

const ACCOUNTS: &str = "\
%rec: Account
%key: Login
%confidential: Password

Login: jemarch
Name: Jose E. Marchesi
Password: secret
";

const MOVIES: &str = "\
%rec: movies
%mandatory: Title Date

Title: Metropolis
Audio: German
Date: 1927

Title: Solaris
Audio: Russian

Title: Das Boot
Audio: German
Audio: English

Title: Cabaret
Audio: English
Date: 1972
";

fn write(dir: &TempDir, name: &str, text: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, text).unwrap();
    path
}

fn book_opts<'a>() -> QueryOptions<'a> {
    QueryOptions {
        type_name: Some("Book".into()),
        ..Default::default()
    }
}

#[test]
fn round_trip_through_a_file() {
    let tmp = TempDir::new().unwrap();
    let path = write(&tmp, "books.rec", BOOKS);

    let db = Database::load(&path).unwrap();
    let out = tmp.path().join("copy.rec");
    db.write(&out).unwrap();

    assert_eq!(std::fs::read_to_string(&out).unwrap(), BOOKS);
    assert_eq!(Database::load(&out).unwrap(), db);
}

#[test]
fn german_movies_copied_into_a_new_database() {
    let tmp = TempDir::new().unwrap();
    let db = Database::load(write(&tmp, "movies.rec", MOVIES)).unwrap();

    let sex = Sex::compile_with("Audio = 'German'", true).unwrap();
    let opts = QueryOptions {
        type_name: Some("movies".into()),
        selector: Selector::Sex(&sex),
        limit: Some(10),
        ..Default::default()
    };
    let german = recdb::query(&db, &opts).unwrap();
    let titles: Vec<&str> = german.iter().filter_map(|r| r.first_value("Title")).collect();
    assert_eq!(titles, vec!["Metropolis", "Das Boot"]);

    let mut out = Database::new();
    out.insert_record_set(german, 2).unwrap();
    let path = tmp.path().join("german.rec");
    out.write(&path).unwrap();

    let reloaded = Database::load(&path).unwrap();
    assert_eq!(reloaded.types(), vec!["movies"]);
    assert_eq!(reloaded.get_record_set(0).unwrap().num_records(), 2);
}

#[test]
fn authors_of_books_at_home() {
    let db: Database = BOOKS.parse().unwrap();
    let sex = Sex::compile("Location = 'home'").unwrap();
    let opts = QueryOptions {
        selector: Selector::Sex(&sex),
        fex: Some(Fex::new("Author", FexKind::Simple).unwrap()),
        ..book_opts()
    };
    let result = recdb::query(&db, &opts).unwrap();
    let authors: Vec<&str> = result.iter().filter_map(|r| r.first_value("Author")).collect();
    assert_eq!(authors, vec!["Richard M. Stallman", "William Gibson"]);
    assert!(result.iter().all(|r| r.num_fields() == 1));
}

#[test]
fn query_result_is_an_ordered_subset() {
    let db: Database = BOOKS.parse().unwrap();
    let all: Vec<Record> = db.get_record_set_by_type("Book").unwrap().records().to_vec();

    for seed in 0..5 {
        let opts = QueryOptions {
            limit: Some(2),
            random_sample: true,
            seed: Some(seed),
            ..book_opts()
        };
        let sample = recdb::query(&db, &opts).unwrap();
        assert_eq!(sample.num_records(), 2);

        let positions: Vec<usize> = sample
            .iter()
            .map(|r| all.iter().position(|a| a == r).unwrap())
            .collect();
        assert!(positions[0] < positions[1], "seed {seed}: {positions:?}");
    }

    let opts = QueryOptions {
        limit: Some(10),
        random_sample: true,
        ..book_opts()
    };
    assert_eq!(recdb::query(&db, &opts).unwrap().num_records(), 4);
}

#[test]
fn accounts_and_books_in_one_database() {
    let tmp = TempDir::new().unwrap();
    let mut db = Database::load(write(&tmp, "books.rec", BOOKS)).unwrap();
    let accounts = Database::load(write(&tmp, "account.rec", ACCOUNTS)).unwrap();

    let rset = accounts.get_record_set(0).unwrap().clone();
    let desc = rset.descriptor().unwrap();
    assert!(desc.contains_field("%confidential", "Password"));
    assert!(desc.is_confidential("Password"));

    db.insert_record_set(rset.clone(), 0).unwrap();
    assert_eq!(db.types(), vec!["Account", "Book"]);
    assert!(matches!(
        db.insert_record_set(rset, 5),
        Err(RecError::DuplicateType(t)) if t == "Account"
    ));

    db.remove_record_set(1).unwrap();
    assert_eq!(db.types(), vec!["Account"]);
    assert!(matches!(
        db.remove_record_set(2),
        Err(RecError::IndexOutOfRange { index: 2, size: 1 })
    ));
}

#[test]
fn appending_a_file_with_a_known_type() {
    let tmp = TempDir::new().unwrap();
    let mut db = Database::load(write(&tmp, "books.rec", BOOKS)).unwrap();
    let more = write(
        &tmp,
        "more.rec",
        "%rec: Book\n\nTitle: Duplicate\n\n%rec: Loan\n\nWho: Rincewind\n",
    );

    let report = db.append(&more).unwrap();
    assert_eq!(report.added, 1);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(db.types(), vec!["Book", "Loan"]);
    assert_eq!(db.get_record_set_by_type("Book").unwrap().num_records(), 4);
}

#[test]
fn insert_and_delete_are_inverse() {
    let original: Database = BOOKS.parse().unwrap();
    let mut db = original.clone();

    let record = Record::from_fields([
        Field::new("Title", "Dune").unwrap(),
        Field::new("Location", "office").unwrap(),
    ]);
    let opts = InsertOptions {
        type_name: Some("Book".into()),
        ..Default::default()
    };
    assert_eq!(recdb::insert(&mut db, &opts, record).unwrap(), 1);
    assert_ne!(db, original);

    let sex = Sex::compile("Title = 'Dune'").unwrap();
    let opts = DeleteOptions {
        type_name: Some("Book".into()),
        selector: Selector::Sex(&sex),
        ..Default::default()
    };
    assert_eq!(recdb::delete(&mut db, &opts).unwrap(), 1);
    assert_eq!(db, original);
}

#[test]
fn tolkien_wrote_everything_at_home() {
    let tmp = TempDir::new().unwrap();
    let path = write(&tmp, "books.rec", BOOKS);
    let mut db = Database::load(&path).unwrap();

    let sex = Sex::compile("Location = 'home'").unwrap();
    let opts = SetOptions {
        type_name: Some("Book".into()),
        selector: Selector::Sex(&sex),
        fex: Fex::new("Author", FexKind::Simple).unwrap(),
        action: SetAction::SetAdd("J.R.R.Tolkien".into()),
        ..Default::default()
    };
    assert_eq!(recdb::set(&mut db, &opts).unwrap(), 3);
    db.write(&path).unwrap();

    let db = Database::load(&path).unwrap();
    let rset = db.get_record_set_by_type("Book").unwrap();
    let authors: Vec<Option<&str>> = rset.iter().map(|r| r.first_value("Author")).collect();
    assert_eq!(
        authors,
        vec![
            Some("J.R.R.Tolkien"),
            Some("Terry Pratchett"),
            Some("J.R.R.Tolkien"),
            Some("J.R.R.Tolkien"),
        ]
    );
}

#[test]
fn missing_mandatory_dates_in_movies() {
    let db: Database = MOVIES.parse().unwrap();
    let mut errors = Vec::new();
    let n = integrity_check(&db, true, true, &mut errors);
    assert_eq!(n, 2);
    let lines: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
    assert_eq!(
        lines,
        vec![
            "<string>:8: error: mandatory field 'Date' is missing",
            "<string>:11: error: mandatory field 'Date' is missing",
        ]
    );
}

#[test]
fn syntax_errors_abort_the_load() {
    let tmp = TempDir::new().unwrap();
    let path = write(&tmp, "bad.rec", "%rec: A\n\nTitle: fine\nnot a field\n");
    let err = Database::load(&path).unwrap_err();
    assert!(err.to_string().contains("bad.rec:4"), "{err}");
}
