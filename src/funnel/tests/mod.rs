mod answers;
mod common;
