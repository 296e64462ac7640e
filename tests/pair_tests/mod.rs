mod cli_args_test;
mod scheduler_test;
