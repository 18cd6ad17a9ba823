//! Abstractions for cursor-based pagination.

use std::cmp;

/// Generic pagination connection.
#[derive(Clone, Debug)]
pub struct Connection<C, I> {
    /// [`Edge`]s in this [`Connection`].
    pub edges: Vec<Edge<C, I>>,

    /// Indicator whether there are more nodes after this [`Connection`].
    pub has_more: bool,
}

/// A page in a [`Connection`].
pub type Page<C, I> = Connection<C, I>;

impl<C, I> Connection<C, I> {
    /// Creates a new [`Connection`] from the provided [`Edge`]s.
    #[must_use]
    pub fn new(
        edges: impl IntoIterator<Item = impl Into<Edge<C, I>>>,
        has_more: bool,
    ) -> Self {
        Self {
            edges: edges.into_iter().map(Into::into).collect::<Vec<_>>(),
            has_more,
        }
    }

    /// Creates a new [`Connection`] out of `limit + 1` fetched [`Edge`]s.
    ///
    /// The extra [`Edge`] (if fetched) is dropped and only signals that there
    /// are more nodes.
    #[must_use]
    pub fn from_overfetched(
        args: &Arguments<C>,
        edges: impl IntoIterator<Item = impl Into<Edge<C, I>>>,
    ) -> Self {
        let mut edges =
            edges.into_iter().map(Into::into).collect::<Vec<Edge<C, I>>>();
        let has_more = edges.len() > args.limit();
        edges.truncate(args.limit());
        Self { edges, has_more }
    }

    /// Returns cursor of the next page, if there is one.
    ///
    /// It's always the cursor of the last [`Edge`] in this [`Connection`].
    #[must_use]
    pub fn next_cursor(&self) -> Option<&C> {
        if self.has_more {
            self.edges.last().map(|e| &e.cursor)
        } else {
            None
        }
    }

    /// Returns the nodes of this [`Connection`] in order.
    pub fn nodes(&self) -> impl Iterator<Item = &I> {
        self.edges.iter().map(|e| &e.node)
    }
}

/// An edge in a [`Connection`].
#[derive(Clone, Copy, Debug)]
pub struct Edge<C, I> {
    /// Cursor of this [`Edge`].
    pub cursor: C,

    /// Node of this [`Edge`].
    pub node: I,
}

impl<C, I> From<(C, I)> for Edge<C, I> {
    fn from((cursor, node): (C, I)) -> Self {
        Self { cursor, node }
    }
}

/// Forward pagination arguments.
#[derive(Clone, Copy, Debug)]
pub struct Arguments<C> {
    /// Number of items to return.
    first: usize,

    /// Cursor after which to return items.
    after: Option<C>,
}

impl<C> Arguments<C> {
    /// Creates a new [`Arguments`].
    ///
    /// [`None`] is returned if `first` is not a positive number.
    pub fn new<Num>(first: Num, after: Option<C>) -> Option<Self>
    where
        Num: TryInto<usize>,
    {
        let first = first.try_into().ok().filter(|n| *n > 0)?;
        Some(Self { first, after })
    }

    /// Returns cursor requested by this [`Arguments`].
    #[must_use]
    pub fn cursor(&self) -> Option<&C> {
        self.after.as_ref()
    }

    /// Returns limit requested by this [`Arguments`].
    #[must_use]
    pub fn limit(&self) -> usize {
        self.first
    }
}

/// Pagination selector.
#[derive(Clone, Copy, Debug)]
pub struct Selector<C, F> {
    /// Pagination [`Arguments`].
    pub arguments: Arguments<C>,

    /// Additional filter being applied to the result.
    pub filter: F,
}

/// Order of a sorted column.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum Order {
    /// Ascending order.
    #[cfg_attr(feature = "serde", serde(rename = "asc"))]
    Ascending,

    /// Descending order.
    #[cfg_attr(feature = "serde", serde(rename = "desc"))]
    Descending,
}

impl Order {
    /// Applies this [`Order`] to the ascending [`cmp::Ordering`].
    #[must_use]
    pub fn apply(self, ordering: cmp::Ordering) -> cmp::Ordering {
        match self {
            Self::Ascending => ordering,
            Self::Descending => ordering.reverse(),
        }
    }

    #[cfg(feature = "postgres")]
    /// Returns SQL operator representing this [`Order`].
    #[must_use]
    pub const fn sql(&self) -> &'static str {
        match self {
            Self::Ascending => "ASC",
            Self::Descending => "DESC",
        }
    }
}

/// Defines pagination types.
#[expect(clippy::module_name_repetitions, reason = "more readable")]
#[macro_export]
macro_rules! define_pagination {
    ($cursor:ty, $node:ty, $filter:ty) => {
        #[doc = "Edge of a [`Connection`]."]
        pub type Edge = $crate::pagination::Edge<$cursor, $node>;

        #[doc = "A [`Connection`] of [`$node`]s."]
        pub type Connection = $crate::pagination::Connection<$cursor, $node>;

        #[doc = "A [`Page`] of [`$node`]s."]
        pub type Page = $crate::pagination::Page<$cursor, $node>;

        #[doc = "Arguments for selecting a [`Page`]."]
        pub type Arguments = $crate::pagination::Arguments<$cursor>;

        #[doc = "[`Page`] selector."]
        pub type Selector = $crate::pagination::Selector<$cursor, $filter>;
    };
}

#[cfg(test)]
mod spec {
    use std::cmp;

    use super::{Arguments, Connection, Order};

    #[test]
    fn arguments_require_positive_limit() {
        assert!(Arguments::<u8>::new(0, None).is_none());
        assert!(Arguments::<u8>::new(-1, None).is_none());
        assert_eq!(Arguments::<u8>::new(20, None).unwrap().limit(), 20);
        assert_eq!(Arguments::new(1, Some(7_u8)).unwrap().cursor(), Some(&7));
    }

    #[test]
    fn drops_overfetched_edge() {
        let args = Arguments::new(2, None::<u8>).unwrap();

        let page = Connection::<u8, char>::from_overfetched(
            &args,
            [(1_u8, 'a'), (2, 'b'), (3, 'c')],
        );
        assert!(page.has_more);
        assert_eq!(page.nodes().copied().collect::<String>(), "ab");
        assert_eq!(page.next_cursor(), Some(&2));

        let page = Connection::<u8, char>::from_overfetched(
            &args,
            [(1_u8, 'a'), (2, 'b')],
        );
        assert!(!page.has_more);
        assert_eq!(page.next_cursor(), None);
    }

    #[test]
    fn next_cursor_is_absent_without_more() {
        let page = Connection::<u8, char>::new([(1_u8, 'a')], false);
        assert_eq!(page.next_cursor(), None);

        let page = Connection::<u8, char>::new([(1_u8, 'a')], true);
        assert_eq!(page.next_cursor(), Some(&1));

        let page = Connection::<u8, char>::new(Vec::<(u8, char)>::new(), true);
        assert_eq!(page.next_cursor(), None);
    }

    #[test]
    fn order_applies() {
        assert_eq!(
            Order::Descending.apply(1.cmp(&2)),
            cmp::Ordering::Greater,
        );
        assert_eq!(Order::Ascending.apply(1.cmp(&2)), cmp::Ordering::Less);
    }
}
