/// Format a number for display.
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "#NAN!".to_string()
    } else if n.is_infinite() {
        "#INF!".to_string()
    } else if n.fract() == 0.0 && n.abs() < 1e10 {
        format!("{:.0}", n)
    } else {
        let s = format!("{:.2}", n);
        // -0.001 would otherwise show as "-0.00"
        if s == "-0.00" { "0.00".to_string() } else { s }
    }
}
