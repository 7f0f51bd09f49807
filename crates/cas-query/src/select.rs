use crate::field::Filterable;
use crate::filter::{Filter, FilterSet};

/// Decides whether a record belongs in a listing.
pub trait Predicate<T: ?Sized> {
    fn matches(&self, item: &T) -> bool;
}

impl<T: Filterable + ?Sized> Predicate<T> for Filter {
    fn matches(&self, item: &T) -> bool {
        Filter::matches(self, item)
    }
}

impl<T: Filterable + ?Sized> Predicate<T> for FilterSet {
    fn matches(&self, item: &T) -> bool {
        FilterSet::matches(self, item)
    }
}

impl<T: ?Sized, P: Predicate<T> + ?Sized> Predicate<T> for &P {
    fn matches(&self, item: &T) -> bool {
        (**self).matches(item)
    }
}

/// Lazily keep the items `predicate` accepts, in their original order.
pub fn select<T, I, P>(predicate: P, items: I) -> impl Iterator<Item = T>
where
    I: IntoIterator<Item = T>,
    P: Predicate<T>,
{
    items.into_iter().filter(move |item| predicate.matches(item))
}

/// Like [`select`] over fallible items; errors are passed through untouched.
pub fn select_ok<T, E, I, P>(predicate: P, items: I) -> impl Iterator<Item = Result<T, E>>
where
    I: IntoIterator<Item = Result<T, E>>,
    P: Predicate<T>,
{
    items.into_iter().filter(move |item| match item {
        Ok(item) => predicate.matches(item),
        Err(_) => true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::FieldValue;

    struct Num(u64);

    impl Filterable for Num {
        fn field(&self, path: &str) -> Option<FieldValue> {
            (path == "n").then_some(FieldValue::Uint(self.0))
        }
    }

    struct Odd;

    impl Predicate<u64> for Odd {
        fn matches(&self, item: &u64) -> bool {
            item % 2 == 1
        }
    }

    #[test]
    fn keeps_order() {
        let set = FilterSet::parse(["n<3", "n>7"]).unwrap();
        let picked: Vec<u64> = select(&set, (0..10).map(Num)).map(|n| n.0).collect();
        assert_eq!(picked, vec![0, 1, 2, 8, 9]);
    }

    #[test]
    fn empty_set_selects_everything() {
        let set = FilterSet::default();
        assert_eq!(select(&set, (0..4).map(Num)).count(), 4);
    }

    #[test]
    fn custom_predicate() {
        let picked: Vec<u64> = select(Odd, 0..6u64).collect();
        assert_eq!(picked, vec![1, 3, 5]);
    }

    #[test]
    fn is_lazy() {
        let set = FilterSet::parse(["n>=2"]).unwrap();
        let mut pulled = 0;
        let first = select(
            &set,
            (0..).map(|i| {
                pulled += 1;
                Num(i)
            }),
        )
        .next()
        .map(|n| n.0);
        assert_eq!(first, Some(2));
        assert_eq!(pulled, 3);
    }

    #[test]
    fn errors_pass_through() {
        let set = FilterSet::parse(["n==1"]).unwrap();
        let items: Vec<Result<Num, &str>> = vec![Ok(Num(0)), Err("boom"), Ok(Num(1))];
        let out: Vec<Result<u64, &str>> = select_ok(&set, items).map(|r| r.map(|n| n.0)).collect();
        assert_eq!(out, vec![Err("boom"), Ok(1)]);
    }
}
