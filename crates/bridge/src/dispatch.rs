//! Selecting a monomorphization from a runtime primitive.
//!
//! Each macro matches a [`Primitive`](crate::typing::Primitive), binds the
//! given identifier to the corresponding Rust type inside the arm, and
//! evaluates the body. Primitives outside the macro's family evaluate the
//! fallback.

macro_rules! dispatch {
    ($prim:expr, [$($variant:ident => $ty:ty),*], $t:ident => $body:expr, else $fallback:expr) => {
        match $prim {
            $($crate::typing::Primitive::$variant => {
                #[allow(dead_code)]
                type $t = $ty;
                $body
            })*
            #[allow(unreachable_patterns)]
            _ => $fallback,
        }
    };
    ($prim:expr, [$($variant:ident => $ty:ty),*], $t:ident => $body:expr) => {
        match $prim {
            $($crate::typing::Primitive::$variant => {
                #[allow(dead_code)]
                type $t = $ty;
                $body
            })*
        }
    };
}

macro_rules! dispatch_integer {
    ($prim:expr, $t:ident => $body:expr, else $fallback:expr) => {
        dispatch!($prim, [
            I8 => i8, I16 => i16, I32 => i32, I64 => i64,
            U8 => u8, U16 => u16, U32 => u32, U64 => u64, Usize => usize
        ], $t => $body, else $fallback)
    };
}

macro_rules! dispatch_float {
    ($prim:expr, $t:ident => $body:expr, else $fallback:expr) => {
        dispatch!($prim, [F32 => f32, F64 => f64], $t => $body, else $fallback)
    };
}

macro_rules! dispatch_numeric {
    ($prim:expr, $t:ident => $body:expr, else $fallback:expr) => {
        dispatch!($prim, [
            I8 => i8, I16 => i16, I32 => i32, I64 => i64,
            U8 => u8, U16 => u16, U32 => u32, U64 => u64, Usize => usize,
            F32 => f32, F64 => f64
        ], $t => $body, else $fallback)
    };
}

macro_rules! dispatch_hashable {
    ($prim:expr, $t:ident => $body:expr, else $fallback:expr) => {
        dispatch!($prim, [
            Bool => bool, String => String,
            I8 => i8, I16 => i16, I32 => i32, I64 => i64,
            U8 => u8, U16 => u16, U32 => u32, U64 => u64, Usize => usize
        ], $t => $body, else $fallback)
    };
}

macro_rules! dispatch_primitive {
    ($prim:expr, $t:ident => $body:expr) => {
        dispatch!($prim, [
            Bool => bool, String => String,
            I8 => i8, I16 => i16, I32 => i32, I64 => i64,
            U8 => u8, U16 => u16, U32 => u32, U64 => u64, Usize => usize,
            F32 => f32, F64 => f64
        ], $t => $body)
    };
}
