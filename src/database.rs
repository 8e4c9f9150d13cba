use std::collections::HashMap;

use derive_new::new;
use serde::de::DeserializeOwned;
use snafu::{Location, OptionExt as _, ResultExt as _, Snafu};
use surrealdb::engine::any::Any;
use surrealdb::opt::auth;
use surrealdb::opt::{IntoQuery, QueryResult};
use surrealdb::Surreal;
use url::Url;

pub use surrealdb::sql::Thing;

pub type Result<T, E = QueryError> = std::result::Result<T, E>;

const SCHEMA: &str = include_str!("../schema.surrealql");

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ConnectError {
    #[snafu(display("cannot connect to the document store `{url}`: {source}"))]
    Connection {
        url: Url,
        source: surrealdb::Error,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("url `{url}` is missing a namespace parameter (ns)"))]
    NoNamespace {
        url: Url,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("url `{url}` is missing a database parameter (db)"))]
    NoDatabase {
        url: Url,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("failed to apply the store schema: {source}"))]
    Schema {
        source: surrealdb::Error,
        #[snafu(implicit)]
        location: Location,
    },
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum QueryError {
    #[snafu(display("failed to query the document store: {source}"))]
    Query {
        source: surrealdb::Error,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("failed to deserialize the store response: {source}"))]
    Deserialize {
        source: surrealdb::Error,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("the store returned an empty response"))]
    Empty {
        #[snafu(implicit)]
        location: Location,
    },
}

/// A connected handle to the remote document store.
///
/// The connection URL must carry the namespace and database via the `ns` and
/// `db` query parameters. Credentials, when present, are taken from the URL's
/// userinfo section; without credentials the session is scoped with
/// `use_ns`/`use_db` only, which is what the in-memory engine expects.
#[derive(Debug, Clone)]
pub struct Database {
    client: Surreal<Any>,
}

impl Database {
    pub async fn connect(url: Url) -> Result<Self, ConnectError> {
        let session = Session::from_url(&url)?;

        let mut address = url.clone();
        address.set_query(None);
        let _ = address.set_username("");
        let _ = address.set_password(None);

        let client = surrealdb::engine::any::connect(address.as_str())
            .await
            .context(ConnectionSnafu { url: url.clone() })?;

        client
            .use_ns(&session.namespace)
            .use_db(&session.database)
            .await
            .context(ConnectionSnafu { url: url.clone() })?;

        if !session.username.is_empty() {
            client
                .signin(session.credentials())
                .await
                .context(ConnectionSnafu { url: url.clone() })?;
        }

        client.query(SCHEMA).await.context(SchemaSnafu)?;

        Ok(Self { client })
    }

    /// Create a builder to execute arbitrary SurrealQL on the store.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let stories: Vec<Story> = database
    ///     .sql("SELECT * FROM stories WHERE author = $author")
    ///     .bind(("author", author))
    ///     .fetch()
    ///     .await?;
    /// ```
    pub fn sql(&self, query: impl IntoQuery) -> Bindings<'_> {
        Bindings::new(self.client.query(query))
    }
}

impl std::ops::Deref for Database {
    type Target = Surreal<Any>;

    fn deref(&self) -> &Self::Target {
        &self.client
    }
}

/// Namespace, database and (optional) credentials parsed out of a store URL.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Session {
    username: String,
    password: String,
    namespace: String,
    database: String,
}

impl Session {
    fn from_url(url: &Url) -> Result<Self, ConnectError> {
        let mut query: HashMap<String, String> = url
            .query_pairs()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();

        let namespace = query
            .remove("ns")
            .context(NoNamespaceSnafu { url: url.clone() })?;
        let database = query
            .remove("db")
            .context(NoDatabaseSnafu { url: url.clone() })?;

        Ok(Session {
            username: url.username().to_owned(),
            password: url.password().unwrap_or("").to_owned(),
            namespace,
            database,
        })
    }

    fn credentials(&self) -> impl auth::Credentials<auth::Signin, auth::Jwt> + '_ {
        auth::Database {
            username: &self.username,
            password: &self.password,
            namespace: &self.namespace,
            database: &self.database,
        }
    }
}

/// A pending query. Parameters are bound with [Bindings::bind] which takes any
/// serializable value.
#[derive(Debug, new)]
pub struct Bindings<'a> {
    query: surrealdb::method::Query<'a, Any>,
}

impl Bindings<'_> {
    pub fn bind(mut self, params: impl serde::Serialize) -> Self {
        let query = self.query;
        self.query = query.bind(params);
        self
    }

    /// Execute the query, surfacing any per-statement error in the response.
    pub async fn execute(self) -> Result<surrealdb::Response> {
        let response = self.query.await.context(QuerySnafu)?;
        response.check().context(QuerySnafu)
    }

    /// Execute the query and deserialize the first statement's result.
    pub async fn fetch<T: DeserializeOwned>(self) -> Result<T>
    where
        usize: QueryResult<T>,
    {
        let mut statements = self.execute().await?;
        statements.take::<T>(0).context(DeserializeSnafu)
    }
}

/// Represents a record stored in a named table.
pub trait Table {
    /// Returns the record id.
    fn id(&self) -> &Thing;

    /// Returns the name of the table the record lives in.
    fn table() -> &'static str;
}

impl<T: Table> Table for &T {
    fn id(&self) -> &Thing {
        (*self).id()
    }

    fn table() -> &'static str {
        T::table()
    }
}

/// Implements [Table] for a model, naming its table and id field.
#[macro_export]
macro_rules! table {
    ($table:literal : $model:ty = $id:ident) => {
        impl $crate::database::Table for $model {
            fn id(&self) -> &$crate::database::Thing {
                self.$id.as_ref()
            }

            fn table() -> &'static str {
                $table
            }
        }
    };
}

/// Defines a method on a model that runs a SurrealQL query against the store.
///
/// # Syntax
/// ```ignore
/// define_relation! {
///     Follow > followees_of(follower: UserId) > Vec<Follow>
///         where "SELECT * FROM follows WHERE follower = $follower"
/// }
///
/// let edges = Follow::followees_of(viewer, &database).await?;
/// ```
#[macro_export]
macro_rules! define_relation {
    ($model:ty > $relation:ident ($($binding:ident : $binding_type:ty),*) > $export:ty where $query:literal) => {
        impl $model {
            pub async fn $relation($($binding : $binding_type ,)* db: &$crate::database::Database) -> $crate::database::Result<$export> {
                db.sql($query)
                    $(.bind((stringify!($binding), $binding)))*
                    .fetch()
                    .await
            }
        }
    };
}

/// A typed record id. `T` must implement the [Table] trait so that the table
/// name can be inferred.
///
/// This type implements [Default] which creates an id with a random UUID.
pub struct Record<T> {
    inner: Thing,
    _marker: std::marker::PhantomData<T>,
}

impl<T: Table> Record<T> {
    /// Creates a new `Record` from the specified `id`, inferring the table name from `T`.
    pub fn new(id: impl Into<surrealdb::sql::Id>) -> Self {
        let inner = Thing {
            tb: T::table().to_string(),
            id: id.into(),
        };

        Record {
            inner,
            _marker: std::marker::PhantomData,
        }
    }

    /// Creates a new `Record` with a random UUID as the identifier.
    pub fn uuid() -> Self {
        Self::new(surrealdb::sql::Id::uuid())
    }
}

impl<T: Table> std::default::Default for Record<T> {
    fn default() -> Self {
        Self::uuid()
    }
}

impl<T> AsRef<Thing> for Record<T> {
    fn as_ref(&self) -> &Thing {
        &self.inner
    }
}

impl<T> std::ops::Deref for Record<T> {
    type Target = Thing;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl<T> std::fmt::Debug for Record<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.inner.fmt(f)
    }
}

impl<T> std::fmt::Display for Record<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.inner.fmt(f)
    }
}

impl<T> std::clone::Clone for Record<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            _marker: std::marker::PhantomData,
        }
    }
}

impl<T> std::cmp::PartialEq for Record<T> {
    fn eq(&self, other: &Self) -> bool {
        self.inner == other.inner
    }
}

impl<T> std::cmp::Eq for Record<T> {}

impl<T> std::hash::Hash for Record<T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.inner.hash(state)
    }
}

impl<T> serde::Serialize for Record<T> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.inner.serialize(serializer)
    }
}

impl<'de, T: Table> serde::Deserialize<'de> for Record<T> {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let thing = Thing::deserialize(deserializer)?;

        let expected = T::table();
        let actual = &thing.tb;

        if expected != actual {
            return Err(serde::de::Error::custom(format!(
                "table name mismatch, expected '{expected}' but got '{actual}'"
            )));
        }

        Ok(Record {
            inner: thing,
            _marker: std::marker::PhantomData,
        })
    }
}

impl<T, R> surrealdb::opt::IntoResource<R> for Record<T>
where
    Thing: surrealdb::opt::IntoResource<R>,
{
    fn into_resource(self) -> std::result::Result<surrealdb::opt::Resource, surrealdb::Error> {
        self.inner.into_resource()
    }
}
