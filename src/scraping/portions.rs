use crate::constants::{MAX_SANE_PORTIONS, RE_FIRST_NUMBER, RE_PORTIONS};

/// Derive a head count from a free-text yield such as "4 servings" or "Porcje: 6".
///
/// Falls back to 1 whenever the text has no usable number, and when the number found
/// exceeds [`MAX_SANE_PORTIONS`], since that is almost always a weight like "380 g".
pub(crate) fn extract_portion_count(yield_text: &str) -> i32 {
    if yield_text.trim().is_empty() {
        return 1;
    }

    if let Some(caps) = RE_PORTIONS.captures(yield_text) {
        if let Some(number) = caps.get(1).or_else(|| caps.get(2)) {
            return sanitize(number.as_str(), yield_text);
        }
    }

    match RE_FIRST_NUMBER.find(yield_text) {
        Some(number) => sanitize(number.as_str(), yield_text),
        None => 1,
    }
}

fn sanitize(number: &str, yield_text: &str) -> i32 {
    match number.parse::<i32>() {
        Ok(count) if count > MAX_SANE_PORTIONS => {
            tracing::warn!(
                "Suspicious portion count {} in yield '{}', assuming it is a weight and using 1",
                count,
                yield_text
            );
            1
        }
        Ok(count) if count > 0 => count,
        _ => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyword_after_number() {
        assert_eq!(extract_portion_count("4 servings"), 4);
        assert_eq!(extract_portion_count("6 porcji"), 6);
        assert_eq!(extract_portion_count("dla 3 osób"), 3);
    }

    #[test]
    fn keyword_before_number() {
        assert_eq!(extract_portion_count("Porcje: 8"), 8);
        assert_eq!(extract_portion_count("Servings 2"), 2);
    }

    #[test]
    fn falls_back_to_first_number() {
        assert_eq!(extract_portion_count("makes 12"), 12);
        assert_eq!(extract_portion_count("12 muffins"), 12);
    }

    #[test]
    fn weights_are_not_portions() {
        assert_eq!(extract_portion_count("380 g"), 1);
        assert_eq!(extract_portion_count("500 servings"), 1);
    }

    #[test]
    fn no_number_means_one() {
        assert_eq!(extract_portion_count(""), 1);
        assert_eq!(extract_portion_count("a family"), 1);
        assert_eq!(extract_portion_count("0 servings"), 1);
    }
}
