// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

pub mod gate;
pub mod password;
pub mod token;

pub use gate::{ActiveUser, AdminUser, Session, VerifiedUser, SESSION_COOKIE};
pub use password::{Credentials, OneTimeToken};
pub use token::{Claims, Sessions};
