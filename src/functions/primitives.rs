use crate::functions::traits::{binary, unary, Primitive};

/// Denominators and log/sqrt arguments below this magnitude are guarded in protected mode.
const PROTECTION_EPS: f64 = 0.001;
/// Upper clamp of the protected exponential's argument.
const EXP_CLAMP: f64 = 100.0;

// --- Arithmetic ---
pub struct Add;
impl Primitive for Add {
    fn ui_name(&self) -> &'static str { "Addition" }
    fn alias(&self) -> &'static str { "add" }
    fn arity(&self) -> usize { 2 }
    fn complexity(&self) -> usize { 1 }
    fn execute(&self, args: &[&[f64]], _protected: bool) -> Vec<f64> {
        binary(args, |a, b| a + b)
    }
    fn render(&self, args: &[String]) -> String {
        format!("({} + {})", args[0], args[1])
    }
}

pub struct Sub;
impl Primitive for Sub {
    fn ui_name(&self) -> &'static str { "Subtraction" }
    fn alias(&self) -> &'static str { "sub" }
    fn arity(&self) -> usize { 2 }
    fn complexity(&self) -> usize { 1 }
    fn execute(&self, args: &[&[f64]], _protected: bool) -> Vec<f64> {
        binary(args, |a, b| a - b)
    }
    fn render(&self, args: &[String]) -> String {
        format!("({} - {})", args[0], args[1])
    }
}

pub struct Mul;
impl Primitive for Mul {
    fn ui_name(&self) -> &'static str { "Multiplication" }
    fn alias(&self) -> &'static str { "mul" }
    fn arity(&self) -> usize { 2 }
    fn complexity(&self) -> usize { 1 }
    fn execute(&self, args: &[&[f64]], _protected: bool) -> Vec<f64> {
        binary(args, |a, b| a * b)
    }
    fn render(&self, args: &[String]) -> String {
        format!("({} * {})", args[0], args[1])
    }
}

pub struct Div;
impl Primitive for Div {
    fn ui_name(&self) -> &'static str { "Division" }
    fn alias(&self) -> &'static str { "div" }
    fn arity(&self) -> usize { 2 }
    fn complexity(&self) -> usize { 2 }
    fn execute(&self, args: &[&[f64]], protected: bool) -> Vec<f64> {
        if protected {
            binary(args, |a, b| if b.abs() > PROTECTION_EPS { a / b } else { 1.0 })
        } else {
            binary(args, |a, b| a / b)
        }
    }
    fn render(&self, args: &[String]) -> String {
        format!("({} / {})", args[0], args[1])
    }
}

pub struct Inv;
impl Primitive for Inv {
    fn ui_name(&self) -> &'static str { "Reciprocal" }
    fn alias(&self) -> &'static str { "inv" }
    fn arity(&self) -> usize { 1 }
    fn complexity(&self) -> usize { 2 }
    fn inverse(&self) -> Option<&'static str> { Some("inv") }
    fn execute(&self, args: &[&[f64]], protected: bool) -> Vec<f64> {
        if protected {
            unary(args, |a| if a.abs() > PROTECTION_EPS { 1.0 / a } else { 1.0 })
        } else {
            unary(args, |a| 1.0 / a)
        }
    }
    fn render(&self, args: &[String]) -> String {
        format!("(1 / {})", args[0])
    }
}

pub struct Neg;
impl Primitive for Neg {
    fn ui_name(&self) -> &'static str { "Negation" }
    fn alias(&self) -> &'static str { "neg" }
    fn arity(&self) -> usize { 1 }
    fn complexity(&self) -> usize { 1 }
    fn inverse(&self) -> Option<&'static str> { Some("neg") }
    fn execute(&self, args: &[&[f64]], _protected: bool) -> Vec<f64> {
        unary(args, |a| -a)
    }
    fn render(&self, args: &[String]) -> String {
        format!("-{}", args[0])
    }
}

pub struct Abs;
impl Primitive for Abs {
    fn ui_name(&self) -> &'static str { "Absolute Value" }
    fn alias(&self) -> &'static str { "abs" }
    fn arity(&self) -> usize { 1 }
    fn complexity(&self) -> usize { 2 }
    fn execute(&self, args: &[&[f64]], _protected: bool) -> Vec<f64> {
        unary(args, f64::abs)
    }
    fn render(&self, args: &[String]) -> String {
        format!("|{}|", args[0])
    }
}

// --- Powers ---
pub struct Square;
impl Primitive for Square {
    fn ui_name(&self) -> &'static str { "Square" }
    fn alias(&self) -> &'static str { "n2" }
    fn arity(&self) -> usize { 1 }
    fn complexity(&self) -> usize { 2 }
    fn inverse(&self) -> Option<&'static str> { Some("sqrt") }
    fn execute(&self, args: &[&[f64]], _protected: bool) -> Vec<f64> {
        unary(args, |a| a * a)
    }
    fn render(&self, args: &[String]) -> String {
        format!("{}^2", args[0])
    }
}

pub struct Cube;
impl Primitive for Cube {
    fn ui_name(&self) -> &'static str { "Cube" }
    fn alias(&self) -> &'static str { "n3" }
    fn arity(&self) -> usize { 1 }
    fn complexity(&self) -> usize { 3 }
    fn execute(&self, args: &[&[f64]], _protected: bool) -> Vec<f64> {
        unary(args, |a| a * a * a)
    }
    fn render(&self, args: &[String]) -> String {
        format!("{}^3", args[0])
    }
}

pub struct Sqrt;
impl Primitive for Sqrt {
    fn ui_name(&self) -> &'static str { "Square Root" }
    fn alias(&self) -> &'static str { "sqrt" }
    fn arity(&self) -> usize { 1 }
    fn complexity(&self) -> usize { 4 }
    fn inverse(&self) -> Option<&'static str> { Some("n2") }
    fn execute(&self, args: &[&[f64]], protected: bool) -> Vec<f64> {
        if protected {
            unary(args, |a| a.abs().sqrt())
        } else {
            unary(args, f64::sqrt)
        }
    }
    fn render(&self, args: &[String]) -> String {
        format!("sqrt({})", args[0])
    }
}

pub struct Exp;
impl Primitive for Exp {
    fn ui_name(&self) -> &'static str { "Exponential" }
    fn alias(&self) -> &'static str { "exp" }
    fn arity(&self) -> usize { 1 }
    fn complexity(&self) -> usize { 4 }
    fn inverse(&self) -> Option<&'static str> { Some("log") }
    fn execute(&self, args: &[&[f64]], protected: bool) -> Vec<f64> {
        if protected {
            unary(args, |a| a.min(EXP_CLAMP).exp())
        } else {
            unary(args, f64::exp)
        }
    }
    fn render(&self, args: &[String]) -> String {
        format!("exp({})", args[0])
    }
}

pub struct Log;
impl Primitive for Log {
    fn ui_name(&self) -> &'static str { "Natural Logarithm" }
    fn alias(&self) -> &'static str { "log" }
    fn arity(&self) -> usize { 1 }
    fn complexity(&self) -> usize { 4 }
    fn inverse(&self) -> Option<&'static str> { Some("exp") }
    fn execute(&self, args: &[&[f64]], protected: bool) -> Vec<f64> {
        if protected {
            unary(args, |a| if a.abs() > PROTECTION_EPS { a.abs().ln() } else { 0.0 })
        } else {
            unary(args, f64::ln)
        }
    }
    fn render(&self, args: &[String]) -> String {
        format!("log({})", args[0])
    }
}

// --- Trigonometric ---
pub struct Sin;
impl Primitive for Sin {
    fn ui_name(&self) -> &'static str { "Sine" }
    fn alias(&self) -> &'static str { "sin" }
    fn arity(&self) -> usize { 1 }
    fn complexity(&self) -> usize { 3 }
    fn is_trig(&self) -> bool { true }
    fn execute(&self, args: &[&[f64]], _protected: bool) -> Vec<f64> {
        unary(args, f64::sin)
    }
    fn render(&self, args: &[String]) -> String {
        format!("sin({})", args[0])
    }
}

pub struct Cos;
impl Primitive for Cos {
    fn ui_name(&self) -> &'static str { "Cosine" }
    fn alias(&self) -> &'static str { "cos" }
    fn arity(&self) -> usize { 1 }
    fn complexity(&self) -> usize { 3 }
    fn is_trig(&self) -> bool { true }
    fn execute(&self, args: &[&[f64]], _protected: bool) -> Vec<f64> {
        unary(args, f64::cos)
    }
    fn render(&self, args: &[String]) -> String {
        format!("cos({})", args[0])
    }
}

pub struct Tan;
impl Primitive for Tan {
    fn ui_name(&self) -> &'static str { "Tangent" }
    fn alias(&self) -> &'static str { "tan" }
    fn arity(&self) -> usize { 1 }
    fn complexity(&self) -> usize { 4 }
    fn is_trig(&self) -> bool { true }
    fn execute(&self, args: &[&[f64]], _protected: bool) -> Vec<f64> {
        unary(args, f64::tan)
    }
    fn render(&self, args: &[String]) -> String {
        format!("tan({})", args[0])
    }
}

pub struct Tanh;
impl Primitive for Tanh {
    fn ui_name(&self) -> &'static str { "Hyperbolic Tangent" }
    fn alias(&self) -> &'static str { "tanh" }
    fn arity(&self) -> usize { 1 }
    fn complexity(&self) -> usize { 4 }
    fn execute(&self, args: &[&[f64]], _protected: bool) -> Vec<f64> {
        unary(args, f64::tanh)
    }
    fn render(&self, args: &[String]) -> String {
        format!("tanh({})", args[0])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protected_division_guards_zero() {
        let num = [1.0, 4.0];
        let den = [0.0, 2.0];
        let out = Div.execute(&[&num, &den], true);
        assert_eq!(out, vec![1.0, 2.0]);

        let raw = Div.execute(&[&num, &den], false);
        assert!(raw[0].is_infinite());
    }

    #[test]
    fn test_protected_log_and_sqrt() {
        let x = [-4.0, 0.0];
        let log = Log.execute(&[&x], true);
        assert!((log[0] - 4.0f64.ln()).abs() < 1e-12);
        assert_eq!(log[1], 0.0);

        let sqrt = Sqrt.execute(&[&x], true);
        assert_eq!(sqrt, vec![2.0, 0.0]);
        assert!(Sqrt.execute(&[&x], false)[0].is_nan());
    }

    #[test]
    fn test_render() {
        let args = vec!["x1".to_string(), "x2".to_string()];
        assert_eq!(Add.render(&args), "(x1 + x2)");
        assert_eq!(Sin.render(&args[..1]), "sin(x1)");
    }
}
