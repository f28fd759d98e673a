//! The standard operator tables.
//!
//! One entry per operator the two languages expose, grouped by operand type.
//! The Spicy unit and sink method tables live at the bottom; they resolve
//! before lowering and are rewritten into runtime calls afterwards.

use crate::ast::types::Constness;
use crate::operators::registry::Operator;
use crate::operators::signature::{Operand, OperandKind, ResultSpec, TypeSpec};
use crate::operators::Kind;

use OperandKind::{In, InOut};
use ResultSpec as R;
use TypeSpec as T;

fn op(kind: Kind, namespace: &'static str, doc: &'static str, operands: Vec<Operand>, result: ResultSpec) -> Operator {
    Operator {
        kind,
        namespace,
        doc,
        operands,
        result,
        member_id: None,
        builtin_id: None,
        requires_type: None,
        materialized: None,
    }
}

fn method(namespace: &'static str, member: &'static str, doc: &'static str, self_: Operand, result: ResultSpec) -> Operator {
    Operator {
        kind: Kind::MemberCall,
        namespace,
        doc,
        operands: vec![self_, Operand::new(In, T::MemberAny), Operand::new(In, T::TupleAny)],
        result,
        member_id: Some(member),
        builtin_id: None,
        requires_type: None,
        materialized: None,
    }
}

fn bool_result() -> ResultSpec {
    R::Fixed(T::Bool, Constness::Const)
}

fn u64_result() -> ResultSpec {
    R::Fixed(T::UnsignedInteger(64), Constness::Const)
}

fn void_result() -> ResultSpec {
    R::Fixed(T::Void, Constness::Const)
}

fn binary(ty: TypeSpec) -> Vec<Operand> {
    vec![Operand::new(In, ty.clone()), Operand::new(In, ty)]
}

fn unary(ty: TypeSpec) -> Vec<Operand> {
    vec![Operand::new(In, ty)]
}

/// All arithmetic and comparison operators for one numeric type
fn numeric(namespace: &'static str, ty: TypeSpec, out: &mut Vec<Operator>) {
    out.push(op(Kind::Sum, namespace, "Computes the sum of both operands.", binary(ty.clone()), R::OperandType(0)));
    out.push(op(Kind::Difference, namespace, "Computes the difference of both operands.", binary(ty.clone()), R::OperandType(0)));
    out.push(op(Kind::Multiple, namespace, "Multiplies both operands.", binary(ty.clone()), R::OperandType(0)));
    out.push(op(Kind::Division, namespace, "Divides the first operand by the second.", binary(ty.clone()), R::OperandType(0)));
    out.push(op(Kind::Power, namespace, "Raises the first operand to the power of the second.", binary(ty.clone()), R::OperandType(0)));
    out.push(op(Kind::SignNeg, namespace, "Inverts the sign of the operand.", unary(ty.clone()), R::OperandType(0)));
    comparisons(namespace, ty, out);
}

fn comparisons(namespace: &'static str, ty: TypeSpec, out: &mut Vec<Operator>) {
    out.push(op(Kind::Equal, namespace, "Compares both operands for equality.", binary(ty.clone()), bool_result()));
    out.push(op(Kind::Unequal, namespace, "Compares both operands for inequality.", binary(ty.clone()), bool_result()));
    out.push(op(Kind::Lower, namespace, "Compares whether the first operand is smaller.", binary(ty.clone()), bool_result()));
    out.push(op(Kind::LowerEqual, namespace, "Compares whether the first operand is smaller or equal.", binary(ty.clone()), bool_result()));
    out.push(op(Kind::Greater, namespace, "Compares whether the first operand is larger.", binary(ty.clone()), bool_result()));
    out.push(op(Kind::GreaterEqual, namespace, "Compares whether the first operand is larger or equal.", binary(ty), bool_result()));
}

/// The complete standard table, HILTI first, then the Spicy additions
pub fn standard_operators() -> Vec<Operator> {
    let mut out = Vec::new();

    /* bool */
    out.push(op(Kind::Equal, "bool", "Compares both boolean values.", binary(T::Bool), bool_result()));
    out.push(op(Kind::Unequal, "bool", "Compares both boolean values for inequality.", binary(T::Bool), bool_result()));
    out.push(op(Kind::BitAnd, "bool", "Computes the conjunction of both values.", binary(T::Bool), bool_result()));
    out.push(op(Kind::BitOr, "bool", "Computes the disjunction of both values.", binary(T::Bool), bool_result()));

    /* integers */
    numeric("signed_integer", T::SignedIntegerAny, &mut out);
    out.push(op(
        Kind::Modulo,
        "signed_integer",
        "Computes the modulus of the first operand with the second.",
        binary(T::SignedIntegerAny),
        R::OperandType(0),
    ));
    numeric("unsigned_integer", T::UnsignedIntegerAny, &mut out);
    out.push(op(
        Kind::Modulo,
        "unsigned_integer",
        "Computes the modulus of the first operand with the second.",
        binary(T::UnsignedIntegerAny),
        R::OperandType(0),
    ));
    out.push(op(Kind::BitAnd, "unsigned_integer", "Computes the bit-wise 'and' of both operands.", binary(T::UnsignedIntegerAny), R::OperandType(0)));
    out.push(op(Kind::BitOr, "unsigned_integer", "Computes the bit-wise 'or' of both operands.", binary(T::UnsignedIntegerAny), R::OperandType(0)));
    out.push(op(Kind::BitXor, "unsigned_integer", "Computes the bit-wise 'xor' of both operands.", binary(T::UnsignedIntegerAny), R::OperandType(0)));
    out.push(op(
        Kind::ShiftLeft,
        "unsigned_integer",
        "Shifts the value left by the given number of bits.",
        vec![Operand::new(In, T::UnsignedIntegerAny), Operand::new(In, T::UnsignedIntegerAny).named("amount")],
        R::OperandType(0),
    ));
    out.push(op(
        Kind::ShiftRight,
        "unsigned_integer",
        "Shifts the value right by the given number of bits.",
        vec![Operand::new(In, T::UnsignedIntegerAny), Operand::new(In, T::UnsignedIntegerAny).named("amount")],
        R::OperandType(0),
    ));
    out.push(op(Kind::Negate, "unsigned_integer", "Computes the bit-wise negation of the operand.", unary(T::UnsignedIntegerAny), R::OperandType(0)));

    /* real */
    numeric("real", T::Real, &mut out);
    out.push(op(Kind::Modulo, "real", "Computes the modulus of the first operand with the second.", binary(T::Real), R::OperandType(0)));

    /* time and interval */
    comparisons("time", T::Time, &mut out);
    comparisons("interval", T::Interval, &mut out);
    out.push(op(
        Kind::Sum,
        "time",
        "Adds the interval to the time.",
        vec![Operand::new(In, T::Time), Operand::new(In, T::Interval)],
        R::OperandType(0),
    ));
    out.push(op(
        Kind::Difference,
        "time",
        "Computes the interval between both times.",
        binary(T::Time),
        R::Fixed(T::Interval, Constness::Const),
    ));

    /* address */
    out.push(op(Kind::Equal, "address", "Compares both addresses.", binary(T::Address), bool_result()));
    out.push(op(Kind::Unequal, "address", "Compares both addresses for inequality.", binary(T::Address), bool_result()));

    /* string */
    out.push(op(Kind::Sum, "string", "Concatenates both strings.", binary(T::String_), R::OperandType(0)));
    out.push(op(Kind::Size, "string", "Returns the number of characters in the string.", unary(T::String_), u64_result()));
    out.push(op(Kind::Equal, "string", "Compares both strings.", binary(T::String_), bool_result()));
    out.push(op(Kind::Unequal, "string", "Compares both strings for inequality.", binary(T::String_), bool_result()));

    /* bytes */
    out.push(op(Kind::Sum, "bytes", "Concatenates both byte sequences.", binary(T::Bytes), R::OperandType(0)));
    out.push(op(
        Kind::SumAssign,
        "bytes",
        "Appends the second operand to the first.",
        vec![Operand::new(InOut, T::Bytes), Operand::new(In, T::Bytes)],
        R::OperandType(0),
    ));
    out.push(op(Kind::Size, "bytes", "Returns the number of bytes in the value.", unary(T::Bytes), u64_result()));
    comparisons("bytes", T::Bytes, &mut out);
    out.push(op(
        Kind::In,
        "bytes",
        "Tests whether the first operand occurs within the second.",
        vec![Operand::new(In, T::Bytes), Operand::new(In, T::Bytes)],
        bool_result(),
    ));
    out.push(op(
        Kind::Index,
        "bytes",
        "Returns the byte at the given index.",
        vec![Operand::new(In, T::Bytes), Operand::new(In, T::UnsignedIntegerAny).named("index")],
        R::ElementOf(0),
    ));
    out.push(op(Kind::Begin, "bytes", "Returns an iterator to the start of the value.", unary(T::Bytes), R::IteratorOf(0)));
    out.push(op(Kind::End, "bytes", "Returns an iterator to the end of the value.", unary(T::Bytes), R::IteratorOf(0)));

    /* bytes iterator */
    out.push(op(Kind::Deref, "bytes_iterator", "Returns the byte the iterator points at.", unary(T::BytesIterator), R::DerefOf(0)));
    out.push(op(Kind::IncrPrefix, "bytes_iterator", "Advances the iterator by one byte.", vec![Operand::new(InOut, T::BytesIterator)], R::OperandType(0)));
    out.push(op(Kind::Equal, "bytes_iterator", "Compares both iterators.", binary(T::BytesIterator), bool_result()));

    /* stream, iterator, view */
    out.push(op(Kind::Size, "stream", "Returns the number of bytes in the stream.", unary(T::Stream), u64_result()));
    out.push(op(
        Kind::SumAssign,
        "stream",
        "Appends bytes to the stream.",
        vec![Operand::new(InOut, T::Stream), Operand::new(In, T::Bytes)],
        R::OperandType(0),
    ));
    out.push(op(Kind::Begin, "stream", "Returns an iterator to the start of the stream.", unary(T::Stream), R::IteratorOf(0)));
    out.push(op(Kind::End, "stream", "Returns an iterator to the end of the stream.", unary(T::Stream), R::IteratorOf(0)));
    out.push(op(Kind::Deref, "stream_iterator", "Returns the byte the iterator points at.", unary(T::StreamIterator), R::DerefOf(0)));
    out.push(op(
        Kind::Sum,
        "stream_iterator",
        "Advances the iterator by the given number of bytes.",
        vec![Operand::new(In, T::StreamIterator), Operand::new(In, T::UnsignedIntegerAny)],
        R::OperandType(0),
    ));
    out.push(op(
        Kind::Difference,
        "stream_iterator",
        "Returns the number of bytes between both iterators.",
        binary(T::StreamIterator),
        u64_result(),
    ));
    out.push(op(Kind::Equal, "stream_iterator", "Compares both iterators.", binary(T::StreamIterator), bool_result()));
    out.push(op(Kind::Lower, "stream_iterator", "Compares both iterator positions.", binary(T::StreamIterator), bool_result()));
    out.push(op(Kind::Size, "stream_view", "Returns the number of bytes in the view.", unary(T::StreamView), u64_result()));
    out.push(op(Kind::Begin, "stream_view", "Returns an iterator to the start of the view.", unary(T::StreamView), R::IteratorOf(0)));
    out.push(op(Kind::End, "stream_view", "Returns an iterator to the end of the view.", unary(T::StreamView), R::IteratorOf(0)));
    out.push(op(Kind::Equal, "stream_view", "Compares a view against a byte sequence.", vec![Operand::new(In, T::StreamView), Operand::new(In, T::Bytes)], bool_result()));
    out.push(method("stream_view", "advance", "Advances the view to the given iterator.", Operand::new(In, T::StreamView), R::OperandType(0)));
    out.push(method("stream_view", "limit", "Returns a view limited to the given number of bytes.", Operand::new(In, T::StreamView), R::OperandType(0)));
    out.push(method("stream_view", "offset", "Returns the offset of the view inside its stream.", Operand::new(In, T::StreamView), u64_result()));
    out.push(method("stream", "trim", "Trims the stream up to the given iterator.", Operand::new(InOut, T::Stream), void_result()));
    out.push(method("stream", "freeze", "Freezes the stream against further data.", Operand::new(InOut, T::Stream), void_result()));

    /* regexp */
    out.push(method("regexp", "find", "Searches the pattern within the given bytes.", Operand::new(In, T::RegExp), R::Fixed(T::TupleOf(vec![T::SignedInteger(32), T::Bytes]), Constness::Const)));
    out.push(method("regexp", "match_groups", "Returns the capture groups of a match.", Operand::new(In, T::RegExp), R::Fixed(T::VectorOf(Box::new(T::Bytes)), Constness::Const)));

    /* enum */
    out.push(op(Kind::Equal, "enum_", "Compares both enum values.", binary(T::EnumAny), bool_result()));
    out.push(op(Kind::Unequal, "enum_", "Compares both enum values for inequality.", binary(T::EnumAny), bool_result()));

    /* bitfield */
    out.push(op(
        Kind::Member,
        "bitfield",
        "Extracts the given bit range.",
        vec![Operand::new(In, T::BitfieldAny), Operand::new(In, T::MemberAny)],
        R::MemberOf,
    ));

    /* tuple */
    out.push(op(Kind::Equal, "tuple", "Compares both tuples element-wise.", binary(T::TupleAny), bool_result()));
    out.push(op(
        Kind::Index,
        "tuple",
        "Extracts the element at the given constant index.",
        vec![Operand::new(In, T::TupleAny), Operand::new(In, T::UnsignedIntegerAny).named("index")],
        R::ElementOf(0),
    ));
    out.push(op(
        Kind::CustomAssign,
        "tuple",
        "Assigns element-wise into the targets of the tuple.",
        vec![Operand::new(InOut, T::TupleAny), Operand::any(In)],
        R::OperandType(0),
    ));
    out.push(op(
        Kind::Member,
        "tuple",
        "Extracts the named element.",
        vec![Operand::new(In, T::TupleAny), Operand::new(In, T::MemberAny)],
        R::MemberOf,
    ));

    /* optional and result */
    out.push(op(Kind::Deref, "optional", "Returns the contained value; throws if unset.", unary(T::OptionalAny), R::DerefOf(0)));
    out.push(op(Kind::Deref, "result", "Returns the contained value; throws on error.", unary(T::ResultAny), R::DerefOf(0)));
    out.push(method("result", "error", "Returns the contained error.", Operand::new(In, T::ResultAny), R::Fixed(T::Library("hilti::rt::result::Error"), Constness::Const)));

    /* references */
    out.push(op(Kind::Deref, "strong_reference", "Returns the referenced instance.", unary(T::StrongRefAny), R::DerefOf(0)));
    out.push(op(Kind::Deref, "weak_reference", "Returns the referenced instance.", unary(T::WeakRefAny), R::DerefOf(0)));
    out.push(op(Kind::Deref, "value_reference", "Returns the referenced instance.", unary(T::ValueRefAny), R::DerefOf(0)));
    out.push(op(Kind::Equal, "strong_reference", "Compares whether both references point at the same instance.", binary(T::StrongRefAny), bool_result()));
    out.push(op(Kind::Equal, "value_reference", "Compares the referenced values.", binary(T::ValueRefAny), bool_result()));

    /* list */
    out.push(op(Kind::Size, "list", "Returns the number of elements in the list.", unary(T::ListAny), u64_result()));
    out.push(op(Kind::Equal, "list", "Compares both lists element-wise.", binary(T::ListAny), bool_result()));

    /* vector */
    out.push(op(Kind::Size, "vector", "Returns the number of elements in the vector.", unary(T::VectorAny), u64_result()));
    out.push(op(Kind::Equal, "vector", "Compares both vectors element-wise.", binary(T::VectorAny), bool_result()));
    out.push(op(
        Kind::Index,
        "vector",
        "Returns the element at the given index.",
        vec![Operand::new(In, T::VectorAny), Operand::new(In, T::UnsignedIntegerAny).named("index")],
        R::ElementOf(0),
    ));
    out.push(op(
        Kind::IndexAssign,
        "vector",
        "Assigns the element at the given index.",
        vec![Operand::new(InOut, T::VectorAny), Operand::new(In, T::UnsignedIntegerAny).named("index"), Operand::any(In)],
        R::ElementOf(0),
    ));
    out.push(op(Kind::Begin, "vector", "Returns an iterator to the start of the vector.", unary(T::VectorAny), R::IteratorOf(0)));
    out.push(op(Kind::End, "vector", "Returns an iterator to the end of the vector.", unary(T::VectorAny), R::IteratorOf(0)));
    out.push(method("vector", "push_back", "Appends an element to the vector.", Operand::new(InOut, T::VectorAny), void_result()));
    out.push(method("vector", "pop_back", "Removes the last element from the vector.", Operand::new(InOut, T::VectorAny), void_result()));
    out.push(method("vector", "back", "Returns the last element of the vector.", Operand::new(In, T::VectorAny), R::ElementOf(0)));
    out.push(method("vector", "reserve", "Reserves space for the given number of elements.", Operand::new(InOut, T::VectorAny), void_result()));

    /* set */
    out.push(op(Kind::Size, "set", "Returns the number of elements in the set.", unary(T::SetAny), u64_result()));
    out.push(op(
        Kind::In,
        "set",
        "Tests whether the element is a member of the set.",
        vec![Operand::any(In), Operand::new(In, T::SetAny)],
        bool_result(),
    ));
    out.push(op(
        Kind::Add,
        "set",
        "Adds the element to the set.",
        vec![Operand::new(InOut, T::SetAny), Operand::any(In)],
        void_result(),
    ));
    out.push(op(
        Kind::Delete,
        "set",
        "Removes the element from the set.",
        vec![Operand::new(InOut, T::SetAny), Operand::any(In)],
        void_result(),
    ));

    /* map */
    out.push(op(Kind::Size, "map", "Returns the number of entries in the map.", unary(T::MapAny), u64_result()));
    out.push(op(
        Kind::In,
        "map",
        "Tests whether the key is present in the map.",
        vec![Operand::any(In), Operand::new(In, T::MapAny)],
        bool_result(),
    ));
    out.push(op(
        Kind::Index,
        "map",
        "Returns the value stored under the given key.",
        vec![Operand::new(In, T::MapAny), Operand::any(In).named("key")],
        R::ElementOf(0),
    ));
    out.push(op(
        Kind::IndexAssign,
        "map",
        "Stores a value under the given key.",
        vec![Operand::new(InOut, T::MapAny), Operand::any(In).named("key"), Operand::any(In).named("value")],
        R::ElementOf(0),
    ));
    out.push(op(
        Kind::Delete,
        "map",
        "Removes the entry with the given key.",
        vec![Operand::new(InOut, T::MapAny), Operand::any(In).named("key")],
        void_result(),
    ));
    out.push(method("map", "get", "Returns the value for the key, or the default if missing.", Operand::new(In, T::MapAny), R::ElementOf(0)));
    out.push(method("map", "clear", "Removes all entries from the map.", Operand::new(InOut, T::MapAny), void_result()));

    /* struct and union */
    out.push(op(
        Kind::Member,
        "struct_",
        "Accesses the given field.",
        vec![Operand::new(In, T::StructAny), Operand::new(In, T::MemberAny)],
        R::MemberOf,
    ));
    out.push(op(
        Kind::TryMember,
        "struct_",
        "Accesses the given field if it is set.",
        vec![Operand::new(In, T::StructAny), Operand::new(In, T::MemberAny)],
        R::TryMemberOf,
    ));
    out.push(op(
        Kind::HasMember,
        "struct_",
        "Tests whether the field is set.",
        vec![Operand::new(In, T::StructAny), Operand::new(In, T::MemberAny)],
        bool_result(),
    ));
    out.push(op(
        Kind::Unset,
        "struct_",
        "Clears the given field.",
        vec![Operand::new(InOut, T::StructAny), Operand::new(In, T::MemberAny)],
        void_result(),
    ));
    out.push(op(
        Kind::Member,
        "union_",
        "Accesses the given field.",
        vec![Operand::new(In, T::UnionAny), Operand::new(In, T::MemberAny)],
        R::MemberOf,
    ));
    out.push(op(
        Kind::HasMember,
        "union_",
        "Tests whether the field is the active one.",
        vec![Operand::new(In, T::UnionAny), Operand::new(In, T::MemberAny)],
        bool_result(),
    ));

    /* generic */
    out.push(op(
        Kind::Cast,
        "generic",
        "Casts the value to the target type if a coercion exists.",
        vec![Operand::any(In), Operand::new(In, T::TypeAny).named("target")],
        R::TypeOperand(1),
    ));
    out.push(op(
        Kind::New,
        "generic",
        "Allocates a new instance of the target type on the heap.",
        vec![Operand::new(In, T::TypeAny).named("target"), Operand::new(In, T::TupleAny).named("args")],
        R::TypeOperand(0),
    ));
    out.push(op(
        Kind::Pack,
        "generic",
        "Packs a value into a binary representation.",
        vec![Operand::new(In, T::TupleAny)],
        R::Fixed(T::Bytes, Constness::Const),
    ));
    out.push(op(
        Kind::Unpack,
        "generic",
        "Unpacks a value from a binary representation.",
        vec![Operand::new(In, T::TypeAny).named("target"), Operand::new(In, T::TupleAny)],
        R::TypeOperand(0),
    ));
    out.push(op(Kind::Begin, "generic", "Returns an iterator to the start of a container.", vec![Operand::any(In)], R::IteratorOf(0)));
    out.push(op(Kind::End, "generic", "Returns an iterator to the end of a container.", vec![Operand::any(In)], R::IteratorOf(0)));

    /* function calls */
    out.push(op(
        Kind::Call,
        "function",
        "Calls the function with the given arguments.",
        vec![Operand::new(In, T::FunctionAny), Operand::new(In, T::TupleAny).named("args")],
        R::CallResult,
    ));

    /* Spicy: unit */
    out.push(op(
        Kind::Member,
        "unit",
        "Accesses the given unit field.",
        vec![Operand::new(In, T::UnitAny), Operand::new(In, T::MemberAny)],
        R::MemberOf,
    ));
    out.push(op(
        Kind::TryMember,
        "unit",
        "Accesses the given unit field if it is set.",
        vec![Operand::new(In, T::UnitAny), Operand::new(In, T::MemberAny)],
        R::TryMemberOf,
    ));
    out.push(op(
        Kind::HasMember,
        "unit",
        "Tests whether the unit field is set.",
        vec![Operand::new(In, T::UnitAny), Operand::new(In, T::MemberAny)],
        bool_result(),
    ));
    out.push(method("unit", "offset", "Returns the current parsing offset inside the unit.", Operand::new(In, T::UnitAny), u64_result()));
    out.push(method("unit", "position", "Returns the current parsing position.", Operand::new(In, T::UnitAny), R::Fixed(T::StreamIterator, Constness::Const)));
    out.push(method("unit", "input", "Returns the position where the unit's parsing began.", Operand::new(In, T::UnitAny), R::Fixed(T::StreamIterator, Constness::Const)));
    out.push(method("unit", "set_input", "Changes the position to continue parsing from.", Operand::new(InOut, T::UnitAny), void_result()));
    out.push(method(
        "unit",
        "find",
        "Searches a byte sequence in the unit's input.",
        Operand::new(In, T::UnitAny),
        R::Fixed(T::OptionalOf(Box::new(T::StreamIterator)), Constness::Const),
    ));
    out.push(method(
        "unit",
        "context",
        "Returns the context instance shared across connected units.",
        Operand::new(In, T::UnitAny),
        R::Fixed(T::StrongRefOf(Box::new(T::Library("spicy_rt::UnitContext"))), Constness::NonConst),
    ));
    out.push(method("unit", "backtrack", "Returns parsing to the most recent '&try' point.", Operand::new(In, T::UnitAny), void_result()));
    out.push(method("unit", "connect_filter", "Connects a filter unit to transform this unit's input.", Operand::new(InOut, T::UnitAny), void_result()));
    out.push(method("unit", "forward", "Forwards data into the filter's output stream.", Operand::new(InOut, T::UnitAny), void_result()));
    out.push(method("unit", "forward_eod", "Signals end-of-data to the filter's output stream.", Operand::new(InOut, T::UnitAny), void_result()));

    /* Spicy: sink */
    out.push(op(Kind::Size, "sink", "Returns the number of bytes written into the sink.", unary(T::Sink), u64_result()));
    out.push(method("sink", "write", "Writes data into the sink.", Operand::new(InOut, T::Sink), void_result()));
    out.push(method("sink", "close", "Closes the sink and disconnects its units.", Operand::new(InOut, T::Sink), void_result()));
    out.push(method("sink", "connect", "Connects a unit instance to the sink.", Operand::new(InOut, T::Sink), void_result()));
    out.push(method("sink", "connect_mime_type", "Connects units matching the given MIME type.", Operand::new(InOut, T::Sink), void_result()));
    out.push(method("sink", "gap", "Reports a gap in the input stream.", Operand::new(InOut, T::Sink), void_result()));
    out.push(method("sink", "sequence_number", "Returns the current sequence number.", Operand::new(In, T::Sink), u64_result()));
    out.push(method("sink", "set_auto_trim", "Enables or disables automatic trimming.", Operand::new(InOut, T::Sink), void_result()));
    out.push(method("sink", "set_initial_sequence_number", "Sets the initial sequence number.", Operand::new(InOut, T::Sink), void_result()));
    out.push(method("sink", "set_policy", "Sets the reassembly policy.", Operand::new(InOut, T::Sink), void_result()));
    out.push(method("sink", "skip", "Skips ahead to the given sequence number.", Operand::new(InOut, T::Sink), void_result()));
    out.push(method("sink", "trim", "Trims the sink's buffer up to the given sequence number.", Operand::new(InOut, T::Sink), void_result()));

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_has_unique_names() {
        let operators = standard_operators();
        let mut names: Vec<String> = operators.iter().map(|operator| operator.name()).collect();
        let total = names.len();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), total, "duplicate operator names in the standard table");
    }

    #[test]
    fn commutative_flags() {
        assert!(Kind::Equal.is_commutative());
        assert!(Kind::Sum.is_commutative());
        assert!(!Kind::Division.is_commutative());
        assert!(!Kind::Member.is_commutative());
    }
}
