use super::ast::BinaryOp;
use crate::lexer::TokenKind;

/// 比较运算符的优先级（`not` 的操作数从这一层开始解析）
pub const COMPARISON_PRECEDENCE: u8 = 40;

/// 二元运算符优先级，0 表示不是二元运算符
pub fn get_precedence(kind: &TokenKind) -> u8 {
    match kind {
        TokenKind::Or => 10,
        TokenKind::And => 20,
        TokenKind::DoubleEqual
        | TokenKind::NotEqual
        | TokenKind::Less
        | TokenKind::LessEqual
        | TokenKind::Greater
        | TokenKind::GreaterEqual
        | TokenKind::In
        | TokenKind::Not => COMPARISON_PRECEDENCE,
        TokenKind::Plus | TokenKind::Minus => 50,
        TokenKind::Star | TokenKind::Slash | TokenKind::DoubleSlash | TokenKind::Percent => 60,
        _ => 0,
    }
}

pub fn binary_op(kind: &TokenKind) -> Option<BinaryOp> {
    let op = match kind {
        TokenKind::Or => BinaryOp::Or,
        TokenKind::And => BinaryOp::And,
        TokenKind::DoubleEqual => BinaryOp::Eq,
        TokenKind::NotEqual => BinaryOp::NotEq,
        TokenKind::Less => BinaryOp::Lt,
        TokenKind::LessEqual => BinaryOp::LtE,
        TokenKind::Greater => BinaryOp::Gt,
        TokenKind::GreaterEqual => BinaryOp::GtE,
        TokenKind::In => BinaryOp::In,
        TokenKind::Plus => BinaryOp::Add,
        TokenKind::Minus => BinaryOp::Sub,
        TokenKind::Star => BinaryOp::Mul,
        TokenKind::Slash => BinaryOp::Div,
        TokenKind::DoubleSlash => BinaryOp::FloorDiv,
        TokenKind::Percent => BinaryOp::Mod,
        _ => return None,
    };
    Some(op)
}
