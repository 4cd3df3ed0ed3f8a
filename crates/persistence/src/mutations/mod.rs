// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! State-changing incident operations.
//!
//! Every function that touches more than one table runs inside an
//! `IMMEDIATE` transaction so the write lock is taken before the first read.

pub mod incidents;
