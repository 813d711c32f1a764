use ccbench::array_literal::{parse_list, parse_rows, parse_size, ArrayLiteral, LiteralError};

#[test]
fn test_plain_and_range_lists() {
    assert_eq!(parse_list("[1,2,3]").unwrap(), vec![1, 2, 3]);
    assert_eq!(parse_list("[0...3]").unwrap(), vec![0, 1, 2, 3]);
    assert_eq!(parse_list("[3...0]").unwrap(), vec![3, 2, 1, 0]);
    assert_eq!(parse_list("[0,...,39]").unwrap(), (0..=39).collect::<Vec<_>>());
    assert_eq!(parse_list("[ 4 , 8...10 ]").unwrap(), vec![4, 8, 9, 10]);
    assert_eq!(parse_list("[5...5]").unwrap(), vec![5]);
    assert_eq!(parse_list("12").unwrap(), vec![12]);
}

#[test]
fn test_range_at_the_top_of_usize() {
    let max = usize::MAX;
    assert_eq!(parse_list(&format!("[{max}...{max}]")).unwrap(), vec![max]);
    assert_eq!(
        parse_list(&format!("[{}...{max}]", max - 1)).unwrap(),
        vec![max - 1, max]
    );
    assert_eq!(
        parse_list(&format!("[{max}...{}]", max - 1)).unwrap(),
        vec![max, max - 1]
    );
}

#[test]
fn test_jagged_rows() {
    let expected = vec![vec![0, 1], vec![2, 3, 4]];
    assert_eq!(parse_rows("[0,1][2...4]").unwrap(), expected);
    assert_eq!(parse_rows("[0,1],[2,3,4]").unwrap(), expected);
    assert_eq!(parse_rows("[[0,1],[2,3,4]]").unwrap(), expected);

    let literal: ArrayLiteral = "[[7],[8,9]]".parse().unwrap();
    assert_eq!(literal.rows(), &[vec![7], vec![8, 9]]);
}

#[test]
fn test_malformed_literals() {
    assert_eq!(parse_rows(""), Err(LiteralError::Empty));
    assert_eq!(parse_rows("[1,2"), Err(LiteralError::Unclosed));
    assert!(matches!(parse_rows("[...3]"), Err(LiteralError::OpenRange { .. })));
    assert!(matches!(parse_rows("[1...]"), Err(LiteralError::OpenRange { .. })));
    assert!(matches!(
        parse_rows("[1 2]"),
        Err(LiteralError::UnexpectedToken { .. })
    ));
    assert!(matches!(
        parse_rows("[a]"),
        Err(LiteralError::UnexpectedChar { found: 'a', .. })
    ));
    assert!(matches!(
        parse_rows("[[1],[2]"),
        Err(LiteralError::Unclosed)
    ));
    assert!(matches!(
        parse_rows("[99999999999999999999999]"),
        Err(LiteralError::Overflow(_))
    ));
}

#[test]
fn test_sizes() {
    assert_eq!(parse_size("4096").unwrap(), 4096);
    assert_eq!(parse_size("64K").unwrap(), 64 << 10);
    assert_eq!(parse_size("64KB").unwrap(), 64 << 10);
    assert_eq!(parse_size("2m").unwrap(), 2 << 20);
    assert_eq!(parse_size("1Gb").unwrap(), 1 << 30);
    assert_eq!(parse_size("512B").unwrap(), 512);
    assert!(parse_size("B").is_err());
    assert!(parse_size("12Q").is_err());
    assert!(parse_size("").is_err());
}
