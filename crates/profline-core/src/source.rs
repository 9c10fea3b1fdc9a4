//! Record sources feeding the generator

use chrono::{Days, Months, NaiveDate};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::record::Record;

/// Failure producing the next record
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("source exhausted")]
    Exhausted,
}

/// Produces one record per call.
pub trait RecordSource: Send {
    fn next_record(&mut self) -> Result<Record, SourceError>;
}

/// Adapter over any record iterator; reports [`SourceError::Exhausted`] at the end.
pub struct IterSource<I>(I);

impl<I> IterSource<I> {
    pub fn new(iter: I) -> Self {
        Self(iter)
    }
}

impl<I> RecordSource for IterSource<I>
where
    I: Iterator<Item = Record> + Send,
{
    fn next_record(&mut self) -> Result<Record, SourceError> {
        self.0.next().ok_or(SourceError::Exhausted)
    }
}

const FEMALE_NAMES: &[&str] = &[
    "Anna", "Maria", "Elena", "Sofia", "Olga", "Irina", "Laura", "Emma", "Chloe", "Nina",
];
const MALE_NAMES: &[&str] = &[
    "Ivan", "Peter", "Alexei", "David", "Lucas", "Mark", "Oscar", "Tomas", "Victor", "Felix",
];
const SURNAMES: &[&str] = &[
    "Ivanova", "Smith", "Keller", "Novak", "Moreau", "Larsen", "Rossi", "Kowalski", "Berg",
    "Silva", "Horvat", "Fischer",
];
const JOBS: &[&str] = &[
    "Civil engineer",
    "Radiographer",
    "Archivist",
    "Data scientist",
    "Translator",
    "Pharmacist",
    "Geologist",
    "Town planner",
    "Sound technician",
    "Librarian",
];
const COMPANY_SUFFIXES: &[&str] = &["Ltd", "Group", "and Sons", "Inc", "LLC"];
const STREETS: &[&str] = &["Oak", "Mill", "Station", "Church", "Park", "Lake", "River"];
const CITIES: &[&str] = &["Northport", "Lakeview", "Eastfield", "Westbury", "Southgate"];
const BLOOD_GROUPS: &[&str] = &["A+", "A-", "B+", "B-", "AB+", "AB-", "O+", "O-"];
const MAIL_DOMAINS: &[&str] = &["example.com", "example.org", "example.net"];

/// Youngest and oldest generated profile, in years
const MIN_AGE: u32 = 18;
const MAX_AGE: u32 = 80;

/// Synthetic person profiles.
///
/// Seeded sources are reproducible for a fixed `today`.
pub struct ProfileSource {
    rng: StdRng,
    today: NaiveDate,
}

impl ProfileSource {
    pub fn new(seed: Option<u64>, today: NaiveDate) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { rng, today }
    }

    fn pick(&mut self, items: &[&'static str]) -> &'static str {
        items.choose(&mut self.rng).copied().unwrap_or_default()
    }

    fn birthdate(&mut self) -> NaiveDate {
        let youngest = self
            .today
            .checked_sub_months(Months::new(MIN_AGE * 12))
            .unwrap_or(self.today);
        let oldest = self
            .today
            .checked_sub_months(Months::new(MAX_AGE * 12))
            .unwrap_or(youngest);
        let span = (youngest - oldest).num_days().max(0) as u64;
        let offset = self.rng.gen_range(0..=span);
        oldest.checked_add_days(Days::new(offset)).unwrap_or(oldest)
    }
}

impl RecordSource for ProfileSource {
    fn next_record(&mut self) -> Result<Record, SourceError> {
        let female = self.rng.gen_bool(0.5);
        let first = self.pick(if female { FEMALE_NAMES } else { MALE_NAMES });
        let last = self.pick(SURNAMES);
        let company = format!("{} {}", self.pick(SURNAMES), self.pick(COMPANY_SUFFIXES));
        let address = format!(
            "{} {} Street, {}",
            self.rng.gen_range(1..400),
            self.pick(STREETS),
            self.pick(CITIES)
        );
        let username = format!(
            "{}{}",
            first.to_lowercase(),
            self.rng.gen_range(10..1000)
        );
        let mail = format!("{username}@{}", self.pick(MAIL_DOMAINS));

        let mut record = Record::new()
            .with("name", format!("{first} {last}"))
            .with("sex", if female { "F" } else { "M" })
            .with("job", self.pick(JOBS))
            .with("company", company)
            .with("address", address)
            .with("username", username)
            .with("mail", mail)
            .with("blood_group", self.pick(BLOOD_GROUPS));
        let birthdate = self.birthdate();
        record.set_birthdate(birthdate);
        Ok(record)
    }
}
