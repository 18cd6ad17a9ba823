//! [`User`] definitions.

pub mod session;

use std::sync::LazyLock;

use argon2::{
    password_hash::{
        rand_core::OsRng, PasswordHash as Phc, PasswordHasher as _,
        PasswordVerifier as _, SaltString,
    },
    Argon2,
};
#[cfg(doc)]
use common::DateTime;
use common::{unit, DateTimeOf};
use derive_more::{AsRef, Display, From, FromStr, Into};
#[cfg(feature = "postgres")]
use postgres_types::{FromSql, ToSql};
use regex::Regex;
use secrecy::{zeroize::Zeroize, CloneableSecret, ExposeSecret as _, SecretBox};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use self::session::Session;

/// Platform user.
#[derive(Clone, Debug)]
pub struct User {
    /// ID of this [`User`]
    pub id: Id,

    /// [`Name`] of this [`User`].
    pub name: Name,

    /// [`Surname`] of this [`User`], if any.
    pub surname: Option<Surname>,

    /// [`Email`] of this [`User`].
    pub email: Email,

    /// [`PasswordHash`] of this [`User`].
    pub password_hash: PasswordHash,

    /// [`ProfilePath`] of this [`User`], if any.
    pub profile_path: Option<ProfilePath>,

    /// [`DateTime`] when this [`User`] was created.
    pub created_at: CreationDateTime,

    /// [`DateTime`] when this [`User`] was modified the last time.
    pub updated_at: Option<ModificationDateTime>,

    /// [`DateTime`] when this [`User`] was deleted.
    pub deleted_at: Option<DeletionDateTime>,
}

/// ID of a [`User`].
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Deserialize,
    Display,
    Eq,
    From,
    FromStr,
    Hash,
    Into,
    Ord,
    PartialEq,
    PartialOrd,
    Serialize,
)]
#[cfg_attr(feature = "postgres", derive(ToSql, FromSql), postgres(transparent))]
pub struct Id(Uuid);

impl Id {
    /// Creates a new random [`Id`].
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

/// Checks whether the given `text` is a trimmed, non-empty string of at most
/// `max` characters.
fn is_trimmed_text(text: &str, max: usize) -> bool {
    text.trim() == text && !text.is_empty() && text.chars().count() <= max
}

/// Name of a [`User`].
#[derive(AsRef, Clone, Debug, Display, Eq, PartialEq)]
#[as_ref(str, String)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
pub struct Name(String);

impl Name {
    /// Maximum number of characters in a [`Name`].
    pub const MAX_LEN: usize = 255;

    /// Creates a new [`Name`] if the given `name` is valid.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Option<Self> {
        let name = name.into();
        is_trimmed_text(&name, Self::MAX_LEN).then_some(Self(name))
    }
}

impl FromStr for Name {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s).ok_or("invalid `Name`")
    }
}

/// Surname of a [`User`].
#[derive(AsRef, Clone, Debug, Display, Eq, PartialEq)]
#[as_ref(str, String)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
pub struct Surname(String);

impl Surname {
    /// Maximum number of characters in a [`Surname`].
    pub const MAX_LEN: usize = 255;

    /// Creates a new [`Surname`] if the given `surname` is valid.
    #[must_use]
    pub fn new(surname: impl Into<String>) -> Option<Self> {
        let surname = surname.into();
        is_trimmed_text(&surname, Self::MAX_LEN).then_some(Self(surname))
    }
}

impl FromStr for Surname {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s).ok_or("invalid `Surname`")
    }
}

/// Path to a profile picture of a [`User`].
#[derive(AsRef, Clone, Debug, Display, Eq, PartialEq)]
#[as_ref(str, String)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
pub struct ProfilePath(String);

impl ProfilePath {
    /// Maximum number of characters in a [`ProfilePath`].
    pub const MAX_LEN: usize = 1024;

    /// Creates a new [`ProfilePath`] if the given `path` is valid.
    #[must_use]
    pub fn new(path: impl Into<String>) -> Option<Self> {
        let path = path.into();
        is_trimmed_text(&path, Self::MAX_LEN).then_some(Self(path))
    }
}

impl FromStr for ProfilePath {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s).ok_or("invalid `ProfilePath`")
    }
}

/// Password of a [`User`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Password(String);

impl Password {
    /// Minimum number of characters in a [`Password`].
    pub const MIN_LEN: usize = 8;

    /// Maximum number of characters in a [`Password`].
    pub const MAX_LEN: usize = 128;

    /// Creates a new [`Password`] if the given `password` is valid.
    #[must_use]
    pub fn new(password: impl Into<String>) -> Option<Self> {
        let password = password.into();
        Self::check(&password).then_some(Self(password))
    }

    /// Checks whether the given `password` is a valid [`Password`].
    fn check(password: &str) -> bool {
        (Self::MIN_LEN..=Self::MAX_LEN).contains(&password.chars().count())
    }

    /// Wraps this [`Password`] into a [`SecretBox`].
    #[must_use]
    pub fn into_secret(self) -> SecretBox<Self> {
        SecretBox::new(Box::new(self))
    }
}

impl AsRef<str> for Password {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for Password {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s).ok_or("invalid `Password`")
    }
}

impl CloneableSecret for Password {}
impl Zeroize for Password {
    fn zeroize(&mut self) {
        self.0.zeroize();
    }
}

/// [Argon2id] hash of a [`User`]'s [`Password`] in a [PHC string format].
///
/// [Argon2id]: https://en.wikipedia.org/wiki/Argon2
/// [PHC string format]: https://tinyurl.com/phc-string-format
#[derive(Clone, Debug, Display, Eq, PartialEq)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
pub struct PasswordHash(String);

impl PasswordHash {
    /// Hashes the given [`Password`] with a random salt.
    #[expect(clippy::missing_panics_doc, reason = "infallible")]
    #[must_use]
    pub fn new(password: &SecretBox<Password>) -> Self {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(password.expose_secret().as_ref().as_bytes(), &salt)
            .expect("default `Argon2` params are valid");
        Self(hash.to_string())
    }

    /// Checks whether the given [`Password`] matches this [`PasswordHash`].
    ///
    /// A malformed [`PasswordHash`] never matches.
    #[must_use]
    pub fn verify(&self, password: &SecretBox<Password>) -> bool {
        Phc::new(&self.0).is_ok_and(|hash| {
            Argon2::default()
                .verify_password(
                    password.expose_secret().as_ref().as_bytes(),
                    &hash,
                )
                .is_ok()
        })
    }
}

/// Email address of a [`User`].
///
/// Always stored in lowercase.
#[derive(AsRef, Clone, Debug, Display, Eq, Hash, PartialEq)]
#[as_ref(str, String)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
pub struct Email(String);

impl Email {
    /// Maximum number of characters in an [`Email`].
    pub const MAX_LEN: usize = 255;

    /// Creates a new [`Email`] if the given `address` is valid.
    ///
    /// The `address` is lowercased.
    #[must_use]
    pub fn new(address: impl AsRef<str>) -> Option<Self> {
        let address = address.as_ref().to_lowercase();
        Self::check(&address).then_some(Self(address))
    }

    /// Checks whether the given `address` is a valid [`Email`].
    fn check(address: &str) -> bool {
        /// Regular expression checking [`Email`] format.
        static REGEX: LazyLock<Regex> = LazyLock::new(|| {
            Regex::new(
                r"^[a-z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-z0-9](?:[a-z0-9-]{0,61}[a-z0-9])?(?:\.[a-z0-9](?:[a-z0-9-]{0,61}[a-z0-9])?)+$",
            )
            .expect("valid regex")
        });

        address.chars().count() <= Self::MAX_LEN && REGEX.is_match(address)
    }
}

impl FromStr for Email {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s).ok_or("Invalid email format")
    }
}

/// [`DateTime`] when a [`User`] was created.
pub type CreationDateTime = DateTimeOf<(User, unit::Creation)>;

/// [`DateTime`] when a [`User`] was modified.
pub type ModificationDateTime = DateTimeOf<(User, unit::Modification)>;

/// [`DateTime`] when a [`User`] was deleted.
pub type DeletionDateTime = DateTimeOf<(User, unit::Deletion)>;

#[cfg(test)]
mod spec {
    use super::{Email, Name, Password, PasswordHash, ProfilePath, Surname};

    #[test]
    fn email_is_lowercased() {
        let email = Email::new("John.Doe@Example.COM").unwrap();
        assert_eq!(email.to_string(), "john.doe@example.com");
    }

    #[test]
    fn email_rejects_malformed() {
        for input in ["", "john", "john@", "@example.com", "a b@c.io", "x@y"] {
            assert!(Email::new(input).is_none(), "`{input}` accepted");
        }
        assert_eq!("nope".parse::<Email>().unwrap_err(), "Invalid email format");
    }

    #[test]
    fn names_are_trimmed_and_bounded() {
        assert!(Name::new("Ann").is_some());
        assert!(Name::new(" Ann").is_none());
        assert!(Name::new("").is_none());
        assert!(Name::new("a".repeat(255)).is_some());
        assert!(Name::new("a".repeat(256)).is_none());
        assert!(Surname::new("Lee ").is_none());
        assert!(ProfilePath::new("avatars/1.png").is_some());
        assert!(ProfilePath::new("a".repeat(1025)).is_none());
    }

    #[test]
    fn password_length_is_bounded() {
        assert!(Password::new("1234567").is_none());
        assert!(Password::new("12345678").is_some());
        assert!(Password::new("p".repeat(128)).is_some());
        assert!(Password::new("p".repeat(129)).is_none());
    }

    #[test]
    fn password_hash_verifies() {
        let pass = Password::new("correct horse").unwrap().into_secret();
        let hash = PasswordHash::new(&pass);

        assert!(hash.verify(&pass));
        assert!(
            !hash.verify(&Password::new("battery staple").unwrap().into_secret())
        );
        assert_ne!(hash, PasswordHash::new(&pass), "salt must differ");
    }
}
