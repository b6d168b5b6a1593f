#[macro_export]
macro_rules! args_1 {
    ($inputs:expr) => {{
        if $inputs.len() != 1 {
            $crate::internal::bail!("Expected 1 arg, got {:?}", $inputs)
        }
        let result = $inputs.pop().unwrap();
        ::std::mem::drop($inputs);
        result
    }};
}

#[macro_export]
macro_rules! args_2 {
    ($inputs:expr) => {{
        if $inputs.len() != 2 {
            $crate::internal::bail!("Expected 2 args, got {:?}", $inputs)
        }
        $inputs.reverse();
        let result = ($inputs.pop().unwrap(), $inputs.pop().unwrap());
        ::std::mem::drop($inputs);
        result
    }};
}

#[macro_export]
macro_rules! impl_op_same_as {
    () => {
        fn same_as(&self, other: &dyn $crate::ops::Op) -> bool {
            if let Some(other) = other.downcast_ref::<Self>() { self == other } else { false }
        }
    };
}

/// Check the number of input facts an op receives during inference.
#[macro_export]
macro_rules! check_input_arity {
    ($op:expr, $inputs:expr, $n:expr) => {
        if $inputs.len() != $n {
            $crate::internal::bail!(
                "{} expects {} input(s), got {}",
                $op.name(),
                $n,
                $inputs.len()
            )
        }
    };
}
