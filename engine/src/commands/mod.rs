//! Command handlers, grouped the way the keyboard groups them. Every handler takes the core
//! and (where the command has one) its argument, and reports a [`rpn42_core::Control`] code or
//! a typed error; the interpreter owns all post-command bookkeeping.

pub mod alpha;
pub mod arith;
pub mod base;
pub mod conv;
pub mod flagcmds;
pub mod flow;
pub mod modescmd;
pub mod stackops;
pub mod storage;
