//! Everything both ends of the ground link have to agree on: the frame
//! codec, the command codes, and the persisted settings layout.

#![cfg_attr(not(test), no_std)]

pub mod checksum;
pub mod packet;
pub mod settings;
