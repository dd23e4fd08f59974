/// Picks the plural case to render.
///
/// `cases` is never zero when called by a [`crate::MessageContext`], and the returned index is
/// clamped to the available cases afterwards.
pub trait PluralRule: Send + Sync {
    fn select(&self, choice: i64, cases: usize) -> usize;
}

impl<F> PluralRule for F
where
    F: Fn(i64, usize) -> usize + Send + Sync,
{
    fn select(&self, choice: i64, cases: usize) -> usize {
        self(choice, cases)
    }
}

/// Zero/one/other split.
///
/// With two cases the message reads `one | other`, so zero falls on the second case.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultPluralRule;

impl PluralRule for DefaultPluralRule {
    fn select(&self, choice: i64, cases: usize) -> usize {
        let choice = choice.unsigned_abs();
        let index = if cases == 2 {
            match choice {
                1 => 0,
                _ => 1,
            }
        } else {
            choice.min(2) as usize
        };

        index.min(cases.saturating_sub(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::three_zero(0, 3, 0)]
    #[case::three_one(1, 3, 1)]
    #[case::three_many(5, 3, 2)]
    #[case::two_zero(0, 2, 1)]
    #[case::two_one(1, 2, 0)]
    #[case::two_many(7, 2, 1)]
    #[case::negative(-1, 3, 1)]
    #[case::single_case(3, 1, 0)]
    #[case::four_cases(9, 4, 2)]
    fn test_default_rule(#[case] choice: i64, #[case] cases: usize, #[case] expected: usize) {
        assert_eq!(DefaultPluralRule.select(choice, cases), expected);
    }

    #[test]
    fn test_closure_rule() {
        let always_last = |_: i64, cases: usize| cases - 1;
        assert_eq!(always_last.select(0, 3), 2);
    }
}
