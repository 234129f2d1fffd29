/// Below this limit there is no sensible place to cut.
pub const MIN_CUT_SIZE: usize = 32;

/// Splits `data` so that the head ends on a line boundary close to `max_size`.
///
/// Looks backward from `max_size` down to `max_size / 2` for a `\n` first,
/// then forward from `max_size` to the end. When neither finds one, or
/// `max_size` is below [`MIN_CUT_SIZE`], the whole input comes back as the
/// head and the caller has to send it oversized. `head ++ tail == data`
/// always holds.
pub fn cut_point(data: &[u8], max_size: usize) -> (&[u8], &[u8]) {
    if max_size < MIN_CUT_SIZE || data.len() <= max_size {
        return (data, &[]);
    }

    let low = max_size / 2 + 1;
    let backward = data[low..=max_size]
        .iter()
        .rposition(|&b| b == b'\n')
        .map(|pos| low + pos);

    let cut = backward.or_else(|| {
        data[max_size + 1..]
            .iter()
            .position(|&b| b == b'\n')
            .map(|pos| max_size + 1 + pos)
    });

    match cut {
        Some(idx) => data.split_at(idx + 1),
        None => (data, &[]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(count: usize, width: usize) -> Vec<u8> {
        let mut data = Vec::new();
        for i in 0..count {
            let fill = char::from(b'a' + (i % 26) as u8);
            data.extend(std::iter::repeat_n(fill as u8, width - 1));
            data.push(b'\n');
        }
        data
    }

    #[test]
    fn test_short_input_is_not_cut() {
        let data = lines(3, 10);
        let (head, tail) = cut_point(&data, 64);
        assert_eq!(head, &data[..]);
        assert!(tail.is_empty());
    }

    #[test]
    fn test_tiny_limit_is_ignored() {
        let data = lines(10, 10);
        let (head, tail) = cut_point(&data, 16);
        assert_eq!(head, &data[..]);
        assert!(tail.is_empty());
    }

    #[test]
    fn test_cuts_backward_at_last_boundary() {
        // Lines of 10 bytes: boundaries at 9, 19, 29, ...
        let data = lines(10, 10);
        let (head, tail) = cut_point(&data, 45);
        assert_eq!(head.len(), 40);
        assert_eq!(*head.last().unwrap(), b'\n');
        assert_eq!([head, tail].concat(), data);
    }

    #[test]
    fn test_boundary_exactly_at_limit() {
        let data = lines(10, 10);
        let (head, tail) = cut_point(&data, 39);
        assert_eq!(head.len(), 40);
        assert_eq!(tail.len(), 60);
    }

    #[test]
    fn test_falls_back_to_forward_search() {
        // One short line, then a line far longer than the limit.
        let mut data = b"short\n".to_vec();
        data.extend(std::iter::repeat_n(b'x', 200));
        data.push(b'\n');
        data.extend(b"tail\n");

        let (head, tail) = cut_point(&data, 64);
        assert_eq!(head.len(), 6 + 201);
        assert_eq!(tail, b"tail\n");
    }

    #[test]
    fn test_no_boundary_returns_everything() {
        let data = vec![b'z'; 500];
        let (head, tail) = cut_point(&data, 64);
        assert_eq!(head.len(), 500);
        assert!(tail.is_empty());
    }

    #[test]
    fn test_head_plus_tail_is_input_for_many_limits() {
        let mut data = Vec::new();
        for width in [3usize, 17, 80, 5, 240, 33, 9, 120] {
            data.extend(std::iter::repeat_n(b'q', width));
            data.push(b'\n');
        }

        for max_size in 0..data.len() + 4 {
            let (head, tail) = cut_point(&data, max_size);
            assert_eq!([head, tail].concat(), data, "max_size={max_size}");
            if !tail.is_empty() {
                assert_eq!(*head.last().unwrap(), b'\n', "max_size={max_size}");
            }
        }
    }
}
