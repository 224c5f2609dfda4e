pub mod test_add_and_remove;
