//! Gap-filling sequence numbers.
//!
//! The caller decides which numbers are held (live records only, or live records plus retired
//! numbers); this module only answers "what is the lowest positive integer nobody holds".

pub const FIRST_NUMBER: i64 = 1;

/// Returns the lowest integer `>= 1` that is absent from `held`.
///
/// Input order and duplicates do not matter, and non-positive values are ignored. With no gap the
/// result is `max + 1`.
pub fn lowest_free<I>(held: I) -> i64
where
	I: IntoIterator<Item = i64>,
{
	let mut numbers: Vec<i64> = held.into_iter().filter(|n| *n >= FIRST_NUMBER).collect();

	numbers.sort_unstable();
	numbers.dedup();

	lowest_free_sorted(&numbers)
}

/// Same as [`lowest_free`] for a slice already sorted ascending without duplicates, which is what
/// an `ORDER BY` query hands back.
pub fn lowest_free_sorted(sorted: &[i64]) -> i64 {
	let mut candidate = FIRST_NUMBER;

	for &number in sorted {
		if number < candidate {
			continue;
		}
		if number > candidate {
			break;
		}

		candidate += 1;
	}

	candidate
}

pub fn is_valid_number(number: i64) -> bool {
	number >= FIRST_NUMBER
}
