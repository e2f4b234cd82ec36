/// Numeric operator that can back a function token.
///
/// Primitives are evaluated column-wise: every argument is a slice holding one
/// value per data row, and the output has the same number of rows.
pub trait Primitive: Send + Sync {
    /// Display name
    fn ui_name(&self) -> &'static str;

    /// Name used in function sets and traversals
    fn alias(&self) -> &'static str;

    /// Number of arguments
    fn arity(&self) -> usize;

    /// Weight used by the token complexity measure
    fn complexity(&self) -> usize;

    /// Trigonometric primitives take part in the nested-trig rule
    fn is_trig(&self) -> bool {
        false
    }

    /// Alias of the primitive that undoes this one, if any
    fn inverse(&self) -> Option<&'static str> {
        None
    }

    /// Evaluate over entire columns.
    ///
    /// With `protected` set, domain errors map to finite fallbacks instead of NaN/inf.
    fn execute(&self, args: &[&[f64]], protected: bool) -> Vec<f64>;

    /// Infix/functional rendering of the call for display
    fn render(&self, args: &[String]) -> String;
}

pub(crate) fn unary(args: &[&[f64]], f: impl Fn(f64) -> f64) -> Vec<f64> {
    args[0].iter().map(|&a| f(a)).collect()
}

pub(crate) fn binary(args: &[&[f64]], f: impl Fn(f64, f64) -> f64) -> Vec<f64> {
    args[0]
        .iter()
        .zip(args[1].iter())
        .map(|(&a, &b)| f(a, b))
        .collect()
}
