//! Invocable graph nodes: typed parameter declarations and bodies

use std::{any::Any, collections::HashMap, marker::PhantomData};

use crate::{errors::ExecuteError, labels::ParamName, token::Token};

/// The tokens an instruction fires with, keyed by declared name
pub type TokenMap = HashMap<ParamName, Token>;

/// A typed, named parameter slot of an instruction
#[derive(Debug, Clone)]
pub struct ParamDecl<T> {
	name: ParamName,
	_marker: PhantomData<fn() -> T>,
}

impl<T> ParamDecl<T> {
	/// Declare a parameter with the given name
	pub fn new(name: &str) -> Self {
		Self {
			name: ParamName::new(name),
			_marker: PhantomData,
		}
	}

	/// This parameter's name
	pub fn name(&self) -> &ParamName {
		&self.name
	}
}

/// An invocable unit of computation.
///
/// Given a name→token map containing every declared parameter,
/// [`Instruction::execute`] recovers each argument as its declared
/// type, runs the body, and wraps the return value in a fresh token.
/// Instructions are shared between graph clones and must be reentrant.
pub trait Instruction: Send + Sync {
	/// Fire this instruction with the given inputs
	fn execute(&self, inputs: &TokenMap) -> Result<Token, ExecuteError>;

	/// How many parameters does this instruction declare?
	fn arity(&self) -> usize;
}

/// An [`Instruction`] built from a plain function or closure.
///
/// The body sees native argument types; the scheduler only sees the
/// object-safe [`Instruction`] interface. Implemented for parameter
/// tuples of up to sixteen [`ParamDecl`]s.
pub struct FnInstruction<F, P> {
	body: F,
	params: P,
}

impl<F, P> FnInstruction<F, P> {
	/// Wrap a body and its parameter declarations
	pub fn new(body: F, params: P) -> Self {
		Self { body, params }
	}
}

fn recover<T: Any + Clone>(inputs: &TokenMap, decl: &ParamDecl<T>) -> Result<T, ExecuteError> {
	let token = inputs
		.get(decl.name())
		.ok_or_else(|| ExecuteError::MissingParameter {
			param_name: decl.name().name().clone(),
		})?;
	token
		.value::<T>()
		.ok_or_else(|| ExecuteError::BadParameterType {
			param_name: decl.name().name().clone(),
			expected: std::any::type_name::<T>(),
			actual: token.type_name(),
		})
}

macro_rules! impl_fn_instruction {
	($n:literal $(, $t:ident, $v:ident, $idx:tt)*) => {
		impl<F, R $(, $t)*> Instruction for FnInstruction<F, ($(ParamDecl<$t>,)*)>
		where
			F: Fn($($t),*) -> R + Send + Sync,
			R: Any + Send + Sync,
			$($t: Any + Clone,)*
		{
			fn execute(&self, _inputs: &TokenMap) -> Result<Token, ExecuteError> {
				$(let $v = recover(_inputs, &self.params.$idx)?;)*
				Ok(Token::wrap((self.body)($($v),*)))
			}

			fn arity(&self) -> usize {
				$n
			}
		}
	};
}

impl_fn_instruction!(0);
impl_fn_instruction!(1, A, a, 0);
impl_fn_instruction!(2, A, a, 0, B, b, 1);
impl_fn_instruction!(3, A, a, 0, B, b, 1, C, c, 2);
impl_fn_instruction!(4, A, a, 0, B, b, 1, C, c, 2, D, d, 3);
impl_fn_instruction!(5, A, a, 0, B, b, 1, C, c, 2, D, d, 3, E, e, 4);
impl_fn_instruction!(6, A, a, 0, B, b, 1, C, c, 2, D, d, 3, E, e, 4, G, g, 5);
impl_fn_instruction!(7, A, a, 0, B, b, 1, C, c, 2, D, d, 3, E, e, 4, G, g, 5, H, h, 6);
impl_fn_instruction!(8, A, a, 0, B, b, 1, C, c, 2, D, d, 3, E, e, 4, G, g, 5, H, h, 6, I, i, 7);
impl_fn_instruction!(9, A, a, 0, B, b, 1, C, c, 2, D, d, 3, E, e, 4, G, g, 5, H, h, 6, I, i, 7, J, j, 8);
impl_fn_instruction!(10, A, a, 0, B, b, 1, C, c, 2, D, d, 3, E, e, 4, G, g, 5, H, h, 6, I, i, 7, J, j, 8, K, k, 9);
impl_fn_instruction!(11, A, a, 0, B, b, 1, C, c, 2, D, d, 3, E, e, 4, G, g, 5, H, h, 6, I, i, 7, J, j, 8, K, k, 9, L, l, 10);
impl_fn_instruction!(12, A, a, 0, B, b, 1, C, c, 2, D, d, 3, E, e, 4, G, g, 5, H, h, 6, I, i, 7, J, j, 8, K, k, 9, L, l, 10, M, m, 11);
impl_fn_instruction!(13, A, a, 0, B, b, 1, C, c, 2, D, d, 3, E, e, 4, G, g, 5, H, h, 6, I, i, 7, J, j, 8, K, k, 9, L, l, 10, M, m, 11, N, n, 12);
impl_fn_instruction!(14, A, a, 0, B, b, 1, C, c, 2, D, d, 3, E, e, 4, G, g, 5, H, h, 6, I, i, 7, J, j, 8, K, k, 9, L, l, 10, M, m, 11, N, n, 12, O, o, 13);
impl_fn_instruction!(15, A, a, 0, B, b, 1, C, c, 2, D, d, 3, E, e, 4, G, g, 5, H, h, 6, I, i, 7, J, j, 8, K, k, 9, L, l, 10, M, m, 11, N, n, 12, O, o, 13, Q, q, 14);
impl_fn_instruction!(16, A, a, 0, B, b, 1, C, c, 2, D, d, 3, E, e, 4, G, g, 5, H, h, 6, I, i, 7, J, j, 8, K, k, 9, L, l, 10, M, m, 11, N, n, 12, O, o, 13, Q, q, 14, S, s, 15);

#[cfg(test)]
mod tests {
	use super::*;

	fn token_map(entries: Vec<(&str, Token)>) -> TokenMap {
		entries
			.into_iter()
			.map(|(name, token)| (ParamName::new(name), token))
			.collect()
	}

	#[test]
	fn binds_arguments_by_name() {
		let instruction = FnInstruction::new(
			|x: i64, y: i64| -> i64 { x - y },
			(ParamDecl::<i64>::new("x"), ParamDecl::<i64>::new("y")),
		);

		// Map order must not matter
		let inputs = token_map(vec![("y", Token::wrap(2_i64)), ("x", Token::wrap(10_i64))]);
		let out = instruction.execute(&inputs).unwrap();
		assert_eq!(out.value::<i64>(), Some(8));
		assert_eq!(instruction.arity(), 2);
	}

	#[test]
	fn zero_arity_body() {
		let instruction = FnInstruction::new(|| -> i64 { 7 }, ());
		let out = instruction.execute(&TokenMap::new()).unwrap();
		assert_eq!(out.value::<i64>(), Some(7));
		assert_eq!(instruction.arity(), 0);
	}

	#[test]
	fn missing_parameter_is_an_error() {
		let instruction =
			FnInstruction::new(|x: i64| -> i64 { x }, (ParamDecl::<i64>::new("x"),));
		let inputs = token_map(vec![("not_x", Token::wrap(1_i64))]);
		match instruction.execute(&inputs) {
			Err(ExecuteError::MissingParameter { param_name }) => {
				assert_eq!(&*param_name, "x");
			}
			other => panic!("expected MissingParameter, got {other:?}"),
		}
	}

	#[test]
	fn bad_parameter_type_is_an_error() {
		let instruction =
			FnInstruction::new(|x: i64| -> i64 { x }, (ParamDecl::<i64>::new("x"),));
		let inputs = token_map(vec![("x", Token::wrap(1.5_f64))]);
		match instruction.execute(&inputs) {
			Err(ExecuteError::BadParameterType {
				param_name,
				expected,
				actual,
			}) => {
				assert_eq!(&*param_name, "x");
				assert_eq!(expected, "i64");
				assert_eq!(actual, "f64");
			}
			other => panic!("expected BadParameterType, got {other:?}"),
		}
	}
}
