use crate::{
    expr::{ArithOp, CompareOp, Expr, LikeExpr},
    value::Value,
};
use serde::{
    Deserialize, Deserializer, Serialize, Serializer,
    de::{Error as DeError, SeqAccess, Visitor},
    ser::SerializeSeq,
};
use std::fmt;

///
/// Wire codec
///
/// Expressions cross subsystem boundaries as nested tagged arrays:
/// `["AND", a, b]`, `["PARAM", "name"]`, `["LIKE", subj, pat, esc]`,
/// with scalars as bare scalars. This is the sole interchange format.
///
/// Decoding is also where structural contract violations surface:
/// unknown operator tags and arity violations are hard errors here, so
/// producers fail loudly at the boundary instead of miscomputing later.
///

impl Serialize for Expr {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Value(v) => v.serialize(serializer),
            Self::Param(name) => {
                let mut seq = serializer.serialize_seq(Some(2))?;
                seq.serialize_element("PARAM")?;
                seq.serialize_element(name)?;
                seq.end()
            }
            Self::Func(name, args) => {
                let mut seq = serializer.serialize_seq(Some(2 + args.len()))?;
                seq.serialize_element("FUNC")?;
                seq.serialize_element(name)?;
                for arg in args {
                    seq.serialize_element(arg)?;
                }
                seq.end()
            }
            Self::And(operands) => serialize_tagged(serializer, "AND", operands),
            Self::Or(operands) => serialize_tagged(serializer, "OR", operands),
            Self::Not(inner) => serialize_tagged(serializer, "NOT", std::slice::from_ref(inner)),
            Self::Compare(op, lhs, rhs) => {
                let mut seq = serializer.serialize_seq(Some(3))?;
                seq.serialize_element(op.tag())?;
                seq.serialize_element(lhs)?;
                seq.serialize_element(rhs)?;
                seq.end()
            }
            Self::Like(like) => {
                let tag = if like.negated { "NOT LIKE" } else { "LIKE" };
                let len = if like.escape.is_some() { 4 } else { 3 };
                let mut seq = serializer.serialize_seq(Some(len))?;
                seq.serialize_element(tag)?;
                seq.serialize_element(&like.subject)?;
                seq.serialize_element(&like.pattern)?;
                if let Some(escape) = &like.escape {
                    seq.serialize_element(escape)?;
                }
                seq.end()
            }
            Self::IsNull(inner) => {
                serialize_tagged(serializer, "IS NULL", std::slice::from_ref(inner))
            }
            Self::IsNotNull(inner) => {
                serialize_tagged(serializer, "IS NOT NULL", std::slice::from_ref(inner))
            }
            Self::Arith(op, operands) => serialize_tagged(serializer, op.tag(), operands),
        }
    }
}

fn serialize_tagged<S: Serializer, T: Serialize>(
    serializer: S,
    tag: &str,
    operands: &[T],
) -> Result<S::Ok, S::Error> {
    let mut seq = serializer.serialize_seq(Some(1 + operands.len()))?;
    seq.serialize_element(tag)?;
    for operand in operands {
        seq.serialize_element(operand)?;
    }
    seq.end()
}

struct ExprVisitor;

impl<'de> Visitor<'de> for ExprVisitor {
    type Value = Expr;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a scalar or a tagged expression array")
    }

    fn visit_unit<E: DeError>(self) -> Result<Expr, E> {
        Ok(Expr::Value(Value::Null))
    }

    fn visit_none<E: DeError>(self) -> Result<Expr, E> {
        Ok(Expr::Value(Value::Null))
    }

    fn visit_bool<E: DeError>(self, b: bool) -> Result<Expr, E> {
        Ok(Expr::Value(Value::Bool(b)))
    }

    fn visit_i64<E: DeError>(self, n: i64) -> Result<Expr, E> {
        Ok(Expr::Value(Value::from(n)))
    }

    #[allow(clippy::cast_precision_loss)]
    fn visit_u64<E: DeError>(self, n: u64) -> Result<Expr, E> {
        Ok(Expr::Value(Value::Num(n as f64)))
    }

    fn visit_f64<E: DeError>(self, n: f64) -> Result<Expr, E> {
        Ok(Expr::Value(Value::Num(n)))
    }

    fn visit_str<E: DeError>(self, s: &str) -> Result<Expr, E> {
        Ok(Expr::Value(Value::Text(s.to_string())))
    }

    fn visit_string<E: DeError>(self, s: String) -> Result<Expr, E> {
        Ok(Expr::Value(Value::Text(s)))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Expr, A::Error> {
        let tag: String = seq
            .next_element()?
            .ok_or_else(|| DeError::custom("expression node is missing its operator tag"))?;

        let mut operands: Vec<Expr> = Vec::new();
        while let Some(operand) = seq.next_element()? {
            operands.push(operand);
        }

        build_node(&tag, operands).map_err(DeError::custom)
    }
}

impl<'de> Deserialize<'de> for Expr {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(ExprVisitor)
    }
}

// Enforce each operator's arity contract and reject unknown tags.
fn build_node(tag: &str, mut operands: Vec<Expr>) -> Result<Expr, String> {
    let arity = operands.len();

    match tag {
        "AND" | "OR" => {
            if arity < 2 {
                return Err(format!("{tag} expects at least 2 operands, got {arity}"));
            }
            Ok(if tag == "AND" {
                Expr::And(operands)
            } else {
                Expr::Or(operands)
            })
        }
        "NOT" => {
            let [inner] = take_exact(operands).ok_or_else(|| "NOT expects exactly 1 operand".to_string())?;
            Ok(Expr::Not(Box::new(inner)))
        }
        "IS NULL" => {
            let [inner] = take_exact(operands).ok_or_else(|| "IS NULL expects exactly 1 operand".to_string())?;
            Ok(Expr::IsNull(Box::new(inner)))
        }
        "IS NOT NULL" => {
            let [inner] = take_exact(operands).ok_or_else(|| "IS NOT NULL expects exactly 1 operand".to_string())?;
            Ok(Expr::IsNotNull(Box::new(inner)))
        }
        "=" | "<>" | ">" | ">=" | "<" | "<=" => {
            let op = match tag {
                "=" => CompareOp::Eq,
                "<>" => CompareOp::Ne,
                ">" => CompareOp::Gt,
                ">=" => CompareOp::Gte,
                "<" => CompareOp::Lt,
                _ => CompareOp::Lte,
            };
            let [lhs, rhs] =
                take_exact(operands).ok_or_else(|| format!("{tag} expects exactly 2 operands"))?;
            Ok(Expr::compare(op, lhs, rhs))
        }
        "LIKE" | "NOT LIKE" => {
            if !(2..=3).contains(&arity) {
                return Err(format!("{tag} expects 2 or 3 operands, got {arity}"));
            }
            let escape = (arity == 3).then(|| Box::new(operands.remove(2)));
            let pattern = Box::new(operands.remove(1));
            let subject = Box::new(operands.remove(0));
            Ok(Expr::Like(LikeExpr {
                negated: tag == "NOT LIKE",
                subject,
                pattern,
                escape,
            }))
        }
        "+" | "-" | "*" | "/" | "||" => {
            if arity < 2 {
                return Err(format!("{tag} expects at least 2 operands, got {arity}"));
            }
            let op = match tag {
                "+" => ArithOp::Add,
                "-" => ArithOp::Sub,
                "*" => ArithOp::Mul,
                "/" => ArithOp::Div,
                _ => ArithOp::Concat,
            };
            Ok(Expr::Arith(op, operands))
        }
        "PARAM" => {
            let [name] = take_exact(operands).ok_or_else(|| "PARAM expects exactly 1 operand".to_string())?;
            match name {
                Expr::Value(Value::Text(name)) => Ok(Expr::Param(name)),
                other => Err(format!("PARAM expects a field-name string, got {other:?}")),
            }
        }
        "FUNC" => {
            if operands.is_empty() {
                return Err("FUNC expects a function name".to_string());
            }
            let name = match operands.remove(0) {
                Expr::Value(Value::Text(name)) => name,
                other => {
                    return Err(format!("FUNC expects a function-name string, got {other:?}"));
                }
            };
            match name.as_str() {
                "NOW" if !operands.is_empty() => Err("NOW takes no operands".to_string()),
                "UPPER" | "LOWER" if operands.len() != 1 => {
                    Err(format!("{name} expects exactly 1 operand"))
                }
                _ => Ok(Expr::Func(name, operands)),
            }
        }
        other => Err(format!("unknown operator tag '{other}'")),
    }
}

fn take_exact<const N: usize>(operands: Vec<Expr>) -> Option<[Expr; N]> {
    operands.try_into().ok()
}

///
/// TESTS
///
