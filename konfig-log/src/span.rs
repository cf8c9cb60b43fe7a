//! Span 跟踪
//!
//! span 栈是线程局部的：并发调用各自维护自己的嵌套上下文。

use std::cell::RefCell;

/// Span ID（唯一标识符）
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SpanId(pub u64);

/// Span 表示一个代码执行上下文
#[derive(Clone, Debug, PartialEq)]
pub struct Span {
    pub id: SpanId,
    /// Span 名称（通常是操作名，如 "build"）
    pub name: &'static str,
}

impl Span {
    pub const fn new(id: SpanId, name: &'static str) -> Self {
        Span { id, name }
    }
}

thread_local! {
    static SPAN_STACK: RefCell<Vec<Span>> = const { RefCell::new(Vec::new()) };
}

pub(crate) fn push(span: Span) {
    SPAN_STACK.with(|stack| stack.borrow_mut().push(span));
}

pub(crate) fn pop(id: SpanId) {
    SPAN_STACK.with(|stack| {
        let mut stack = stack.borrow_mut();
        if let Some(pos) = stack.iter().rposition(|s| s.id == id) {
            stack.remove(pos);
        }
    });
}

pub(crate) fn current() -> Option<SpanId> {
    SPAN_STACK.with(|stack| stack.borrow().last().map(|s| s.id))
}

pub(crate) fn depth() -> usize {
    SPAN_STACK.with(|stack| stack.borrow().len())
}
